use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hard bounds on the size of an evaluation group.
pub const MIN_GROUP_SIZE: usize = 2;
pub const MAX_GROUP_SIZE: usize = 5;

/// The institution's settings record. There is exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub city: String,
    /// Governorship the institution reports to.
    pub governor: String,
    pub directorate: String,
    #[serde(default)]
    pub twitter_address: Option<String>,
    #[serde(default)]
    pub facebook_address: Option<String>,
    #[serde(default)]
    pub instagram_address: Option<String>,
    #[serde(default)]
    pub web_address: Option<String>,
    pub inst_name: String,
    pub short_inst_name: String,
    /// Institution name as shown in a collapsed side bar.
    pub html_inst_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub captcha_enabled: bool,
    #[serde(default)]
    pub captcha_public_key: Option<String>,
    #[serde(default)]
    pub captcha_private_key: Option<String>,
    pub will_the_electors_be_emailed: bool,
    /// Closed responses needed before a group's outcome is computed.
    pub min_elector_count: u32,
    pub max_elector_count: u32,
    /// Mean score at or above which a question is approved.
    pub min_pass_point: f64,
}

impl Settings {
    /// The record inserted when the database is first set up.
    pub fn initial() -> Self {
        Self {
            city: String::new(),
            governor: String::new(),
            directorate: String::new(),
            twitter_address: None,
            facebook_address: None,
            instagram_address: None,
            web_address: None,
            inst_name: "Question Bank".to_string(),
            short_inst_name: "QB".to_string(),
            html_inst_name: "QB".to_string(),
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            logo_url: None,
            captcha_enabled: false,
            captcha_public_key: None,
            captcha_private_key: None,
            will_the_electors_be_emailed: false,
            min_elector_count: MIN_GROUP_SIZE as u32,
            max_elector_count: MAX_GROUP_SIZE as u32,
            min_pass_point: 3.0,
        }
    }

    /// Check field lengths and the consistency of the evaluation thresholds.
    pub fn validate(&self) -> Result<()> {
        let limits: [(&str, &str, usize); 7] = [
            ("inst_name", self.inst_name.as_str(), 500),
            ("short_inst_name", self.short_inst_name.as_str(), 300),
            ("html_inst_name", self.html_inst_name.as_str(), 300),
            ("phone", self.phone.as_str(), 15),
            ("email", self.email.as_str(), 50),
            ("address", self.address.as_str(), 500),
            (
                "logo_url",
                self.logo_url.as_deref().unwrap_or_default(),
                300,
            ),
        ];
        for (field, value, max) in limits {
            if value.chars().count() > max {
                return Err(Error::Validation(format!(
                    "`{field}` must be at most {max} characters"
                )));
            }
        }

        let max_group = MAX_GROUP_SIZE as u32;
        if self.min_elector_count < 1
            || self.min_elector_count > self.max_elector_count
            || self.max_elector_count > max_group
        {
            return Err(Error::Validation(format!(
                "elector counts must satisfy 1 <= min ({}) <= max ({}) <= {max_group}",
                self.min_elector_count, self.max_elector_count
            )));
        }
        if !(1.0..=5.0).contains(&self.min_pass_point) {
            return Err(Error::Validation(format!(
                "`min_pass_point` must be between 1 and 5, got {}",
                self.min_pass_point
            )));
        }
        Ok(())
    }
}
