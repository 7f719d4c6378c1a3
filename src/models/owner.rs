use serde::{Deserialize, Serialize};

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub uid: String,
}

impl Owner {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Claims read from an identity token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,       // owner id
    pub exp: usize,        // expiration time
    #[serde(default)]
    pub iat: usize,        // issued at
}
