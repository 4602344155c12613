use std::collections::HashMap;

use handlebars::Handlebars;
use serde::Deserialize;

use super::{MailError, OutgoingMail};

const BUILTIN_TEMPLATES: &str = include_str!("../../templates/mail_templates.json");

/// Mail sent on a status transition. Each transition has its own template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    ServiceOrderReady,
    ServiceOrderOnHold,
    CancelOrder,
    OrderReadyDelivery,
    OrderReadyPickup,
    CancelCart,
    CartPlaced,
    CartAccepted,
    CartCompleted,
}

impl TemplateKey {
    pub const ALL: [TemplateKey; 9] = [
        TemplateKey::ServiceOrderReady,
        TemplateKey::ServiceOrderOnHold,
        TemplateKey::CancelOrder,
        TemplateKey::OrderReadyDelivery,
        TemplateKey::OrderReadyPickup,
        TemplateKey::CancelCart,
        TemplateKey::CartPlaced,
        TemplateKey::CartAccepted,
        TemplateKey::CartCompleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKey::ServiceOrderReady => "serviceOrderReady",
            TemplateKey::ServiceOrderOnHold => "serviceOrderOnHold",
            TemplateKey::CancelOrder => "cancelOrder",
            TemplateKey::OrderReadyDelivery => "orderReady-Delivery",
            TemplateKey::OrderReadyPickup => "orderReady-Pickup",
            TemplateKey::CancelCart => "cancelCart",
            TemplateKey::CartPlaced => "cartPlaced",
            TemplateKey::CartAccepted => "cartAccepted",
            TemplateKey::CartCompleted => "cartCompleted",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailTemplate {
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// The template set, compiled once. Rendering is strict: a template that
/// names a tag the caller did not supply fails instead of sending a mail
/// with a hole in it.
#[derive(Debug, Clone)]
pub struct MailTemplates {
    templates: HashMap<String, MailTemplate>,
    registry: Handlebars<'static>,
}

impl MailTemplates {
    /// Parse and compile a template set. Every [`TemplateKey`] must be present.
    pub fn from_json(document: &str) -> Result<Self, MailError> {
        let templates: HashMap<String, MailTemplate> = serde_json::from_str(document)?;
        if let Some(missing) = TemplateKey::ALL
            .iter()
            .find(|k| !templates.contains_key(k.as_str()))
        {
            return Err(MailError::UnknownTemplate(missing.as_str().to_string()));
        }

        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // Plain-text mail.
        registry.register_escape_fn(handlebars::no_escape);
        for (name, template) in &templates {
            registry
                .register_template_string(&subject_name(name), &template.subject)
                .map_err(|e| MailError::Template(format!("{name} subject: {e}")))?;
            registry
                .register_template_string(&body_name(name), &template.body)
                .map_err(|e| MailError::Template(format!("{name} body: {e}")))?;
        }

        Ok(Self {
            templates,
            registry,
        })
    }

    pub fn builtin() -> Result<Self, MailError> {
        Self::from_json(BUILTIN_TEMPLATES)
    }

    pub fn render(
        &self,
        key: TemplateKey,
        to: impl Into<String>,
        tags: &[(&str, String)],
    ) -> Result<OutgoingMail, MailError> {
        let name = key.as_str();
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| MailError::UnknownTemplate(name.to_string()))?;

        let data: HashMap<&str, &str> = tags.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let subject = self
            .registry
            .render(&subject_name(name), &data)
            .map_err(|e| MailError::Template(format!("{name} subject: {e}")))?;
        let body = self
            .registry
            .render(&body_name(name), &data)
            .map_err(|e| MailError::Template(format!("{name} body: {e}")))?;

        Ok(OutgoingMail {
            to: to.into(),
            cc: template.cc.clone(),
            bcc: template.bcc.clone(),
            subject,
            body,
        })
    }
}

fn subject_name(key: &str) -> String {
    format!("{key}.subject")
}

fn body_name(key: &str) -> String {
    format!("{key}.body")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_tag() -> Vec<(&'static str, String)> {
        ["name", "orderId", "serviceName", "holdReason", "cancelReason", "cartLength", "totalCost"]
            .into_iter()
            .map(|tag| (tag, format!("<{tag}>")))
            .collect()
    }

    fn single(subject: &str, body: &str) -> MailTemplates {
        let mut document = serde_json::Map::new();
        for key in TemplateKey::ALL {
            document.insert(
                key.as_str().to_string(),
                serde_json::json!({ "subject": subject, "body": body }),
            );
        }
        MailTemplates::from_json(&serde_json::Value::Object(document).to_string()).unwrap()
    }

    #[test]
    fn builtin_set_has_every_template() {
        let templates = MailTemplates::builtin().unwrap();
        for key in TemplateKey::ALL {
            assert!(templates.render(key, "a@b.c", &every_tag()).is_ok(), "{}", key.as_str());
        }
    }

    #[test]
    fn placeholders_are_substituted_without_escaping() {
        let templates = single(
            "{{serviceName}} on hold",
            "Hi {{ name }}, {{serviceName}} is on hold: {{holdReason}}.",
        );
        let mail = templates
            .render(
                TemplateKey::ServiceOrderOnHold,
                "asha@campus.example",
                &[
                    ("name", "Asha".to_string()),
                    ("serviceName", "Transcript".to_string()),
                    ("holdReason", "fee & photo missing".to_string()),
                ],
            )
            .unwrap();
        assert_eq!(mail.subject, "Transcript on hold");
        assert_eq!(mail.body, "Hi Asha, Transcript is on hold: fee & photo missing.");
        assert_eq!(mail.to, "asha@campus.example");
    }

    #[test]
    fn missing_tags_fail_rendering() {
        let templates = MailTemplates::builtin().unwrap();
        let err = templates
            .render(TemplateKey::CancelOrder, "a@b.c", &[("name", "Asha".to_string())])
            .unwrap_err();
        assert!(matches!(err, MailError::Template(_)));
    }

    #[test]
    fn unterminated_placeholder_is_rejected_at_load() {
        let mut document = serde_json::Map::new();
        for key in TemplateKey::ALL {
            document.insert(
                key.as_str().to_string(),
                serde_json::json!({ "subject": "s", "body": "total {{cost" }),
            );
        }
        let err = MailTemplates::from_json(&serde_json::Value::Object(document).to_string())
            .unwrap_err();
        assert!(matches!(err, MailError::Template(_)));
    }

    #[test]
    fn incomplete_template_set_is_rejected() {
        let err = MailTemplates::from_json(r#"{"cancelOrder": {"subject": "s", "body": "b"}}"#)
            .unwrap_err();
        assert!(matches!(err, MailError::UnknownTemplate(_)));
    }
}
