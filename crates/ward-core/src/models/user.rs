//! User record

use serde::{Deserialize, Serialize};

/// A clinical staff member who can enter data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
}
