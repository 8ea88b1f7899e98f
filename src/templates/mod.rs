use askama::Template;

#[derive(Clone)]
pub struct AppContext {
    pub base_path: String,
    pub version: String,
}

impl AppContext {
    pub fn asset(&self, path: &str) -> String {
        if self.base_path == "/" {
            format!("/static/{}", path)
        } else {
            format!("{}/static/{}", self.base_path, path)
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub ctx: AppContext,
    pub title: String,
    pub api_url: String,
    pub settings_url: String,
    pub target: String,
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub ctx: AppContext,
    pub title: String,
}
