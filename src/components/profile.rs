use crate::config::ProfileConfig;
use askama::Template;

/// Header profile widget: avatar always, name and email only when `show_details`.
#[derive(Debug, Clone, Template)]
#[template(path = "components/profile.html")]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub show_details: bool,
}

impl Profile {
    pub fn new(config: &ProfileConfig, show_details: bool) -> Self {
        Self {
            name: config.name.clone(),
            email: config.email.clone(),
            avatar_url: config.avatar_url.clone(),
            show_details,
        }
    }
}
