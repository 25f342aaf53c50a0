use serde::{Deserialize, Serialize};

use crate::model::db::Settings;

/// The settings record as shown to anyone, with secrets removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDescription {
    pub city: String,
    pub governor: String,
    pub directorate: String,
    pub twitter_address: Option<String>,
    pub facebook_address: Option<String>,
    pub instagram_address: Option<String>,
    pub web_address: Option<String>,
    pub inst_name: String,
    pub short_inst_name: String,
    pub html_inst_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub logo_url: Option<String>,
    pub captcha_enabled: bool,
    pub captcha_public_key: Option<String>,
    pub will_the_electors_be_emailed: bool,
    pub min_elector_count: u32,
    pub max_elector_count: u32,
    pub min_pass_point: f64,
}

impl From<Settings> for SettingsDescription {
    fn from(settings: Settings) -> Self {
        Self {
            city: settings.city,
            governor: settings.governor,
            directorate: settings.directorate,
            twitter_address: settings.twitter_address,
            facebook_address: settings.facebook_address,
            instagram_address: settings.instagram_address,
            web_address: settings.web_address,
            inst_name: settings.inst_name,
            short_inst_name: settings.short_inst_name,
            html_inst_name: settings.html_inst_name,
            phone: settings.phone,
            email: settings.email,
            address: settings.address,
            logo_url: settings.logo_url,
            captcha_enabled: settings.captcha_enabled,
            captcha_public_key: settings.captcha_public_key,
            will_the_electors_be_emailed: settings.will_the_electors_be_emailed,
            min_elector_count: settings.min_elector_count,
            max_elector_count: settings.max_elector_count,
            min_pass_point: settings.min_pass_point,
        }
    }
}
