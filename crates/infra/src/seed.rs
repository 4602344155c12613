//! Development fixtures loaded into an empty store at startup.

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;

use campusdesk_orders::{Cart, Parameter, Service};

use crate::store::Persistence;
use crate::users::UserRecord;

/// Users, services and parameters to preload. Each user gets an empty cart
/// under the cart id on their record.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Seed {
    pub fn from_json(document: &str) -> anyhow::Result<Self> {
        serde_json::from_str(document).context("malformed seed document")
    }

    pub async fn load_into(self, persistence: &Persistence) -> anyhow::Result<()> {
        let (users, services, parameters) =
            (self.users.len(), self.services.len(), self.parameters.len());

        for user in self.users {
            let cart = Cart::new(user.cart_id, user.institute_id.clone(), Utc::now());
            persistence
                .carts
                .create(cart)
                .await
                .with_context(|| format!("seeding cart of {}", user.institute_id))?;
            persistence
                .users
                .create(user)
                .await
                .context("seeding user")?;
        }
        for service in self.services {
            persistence
                .services
                .create(service)
                .await
                .context("seeding service")?;
        }
        for parameter in self.parameters {
            persistence
                .parameters
                .create(parameter)
                .await
                .context("seeding parameter")?;
        }

        tracing::info!(users, services, parameters, "seed data loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campusdesk_core::InstituteId;

    const DOCUMENT: &str = r#"{
        "users": [{
            "_id": "201501001",
            "name": "R. Iyer",
            "email": "riyer@campus.example",
            "role": "student",
            "cartId": "01890a5d-ac96-774b-bcce-b302099a8057",
            "isActive": true,
            "createdOn": "2024-07-01T09:00:00Z"
        }],
        "services": [{
            "_id": "01890a5d-ac96-774b-bcce-b302099a8058",
            "name": "Transcript",
            "isActive": true,
            "maxUnits": 5,
            "baseCharge": 40,
            "createdOn": "2024-07-01T09:00:00Z"
        }]
    }"#;

    #[tokio::test]
    async fn seeded_users_get_a_cart() {
        let persistence = Persistence::in_memory();
        Seed::from_json(DOCUMENT)
            .unwrap()
            .load_into(&persistence)
            .await
            .unwrap();

        let user = persistence
            .users
            .find_by_id(&InstituteId::new("201501001"))
            .await
            .unwrap()
            .unwrap();
        assert!(persistence.carts.find_by_id(&user.cart_id).await.unwrap().is_some());
        assert_eq!(persistence.services.find(&|_: &Service| true).await.unwrap().len(), 1);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(Seed::from_json(r#"{"orders": []}"#).is_err());
    }
}
