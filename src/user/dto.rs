use serde::Deserialize;

/// Body of `PUT /api/user/profile`. Anything else, password included, is ignored.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}
