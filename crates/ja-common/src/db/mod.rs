mod fault;

pub mod applications;
pub mod competences;
pub mod persons;
pub mod pool;
pub mod schema;
pub mod util;

pub(crate) use fault::db_error;
pub use fault::DbFault;

pub use applications::{
    ApplicationStorageError, list_applications, submit_application, update_application_status,
};
pub use competences::{CompetenceStorageError, list_competences};
pub use persons::{
    PersonStorageError, create_person, find_person_by_email, find_person_by_id,
    find_person_by_username, login, set_password_by_email, update_person,
};
pub use pool::{Database, DbPoolError, PgPool, create_pool_from_url, create_pool_from_url_checked};
pub use schema::{SchemaError, ensure_schema};
