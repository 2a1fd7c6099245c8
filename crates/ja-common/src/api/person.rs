use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Recruiter,
    Applicant,
}

impl Role {
    pub fn id(self) -> i32 {
        match self {
            Role::Recruiter => 1,
            Role::Applicant => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Role::Recruiter),
            2 => Some(Role::Applicant),
            _ => None,
        }
    }
}

/// Person projection without the stored credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonDto {
    pub person_id: i32,
    pub name: String,
    pub surname: String,
    pub pnr: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Role,
}

/// Registration payload. Any role sent by the caller is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPerson {
    pub name: String,
    pub surname: String,
    pub pnr: String,
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonUpdate {
    pub name: String,
    pub surname: String,
    pub pnr: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordSetRequest {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_round_trip() {
        assert_eq!(Role::from_id(Role::Recruiter.id()), Some(Role::Recruiter));
        assert_eq!(Role::from_id(Role::Applicant.id()), Some(Role::Applicant));
        assert_eq!(Role::from_id(7), None);
    }

    #[test]
    fn new_person_role_is_optional_on_the_wire() {
        let person: NewPerson = serde_json::from_value(serde_json::json!({
            "name": "Alice",
            "surname": "Andersson",
            "pnr": "19900101-1234",
            "email": "alice@example.com",
            "username": "alice",
            "password": "hunter22"
        }))
        .unwrap();

        assert!(person.role.is_none());
    }
}
