use chrono::Utc;
use serde_json::Value as JsonValue;

use campusdesk_auth::{Action, Principal, Resource, Scope};
use campusdesk_core::{ExpectedVersion, ServiceId};
use campusdesk_orders::{Service, ServiceChanges};

use super::{check_writable, shape, Workflow, WorkflowError, WorkflowResult};

impl Workflow {
    /// Services the caller may request, by name. Inactive and special
    /// services are listed only for callers entitled to see them.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn list_services(&self, principal: &Principal) -> WorkflowResult<JsonValue> {
        let scoped = self.widest(principal, Resource::Service, Action::Read)?;
        let (see_inactive, see_special) = self.catalog_visibility(principal);

        let me = principal.institute_id.clone();
        let mut services = self
            .persistence
            .services
            .find(&move |s: &Service| s.is_visible_to(&me, see_inactive, see_special))
            .await?;
        services.sort_by(|a, b| a.name.cmp(&b.name));
        shape(&services, &scoped.grant)
    }

    /// A service the caller could see in the listing; anything else is
    /// reported as missing.
    #[tracing::instrument(
        skip(self, principal),
        fields(actor = %principal.institute_id, service_id = %id),
        err
    )]
    pub async fn get_service(
        &self,
        principal: &Principal,
        id: ServiceId,
    ) -> WorkflowResult<JsonValue> {
        let scoped = self.widest(principal, Resource::Service, Action::Read)?;
        let (see_inactive, see_special) = self.catalog_visibility(principal);
        let service = self
            .load_service(&id)
            .await?
            .filter(|s| s.is_visible_to(&principal.institute_id, see_inactive, see_special))
            .ok_or_else(|| WorkflowError::NotFound("service".into()))?;
        shape(&service, &scoped.grant)
    }

    #[tracing::instrument(skip(self, principal, changes), fields(actor = %principal.institute_id), err)]
    pub async fn add_service(
        &self,
        principal: &Principal,
        changes: ServiceChanges,
    ) -> WorkflowResult<JsonValue> {
        let grant = self.require(principal, Resource::Service, Action::Create, Scope::Any)?;
        check_writable(&grant, &changes.touched_fields())?;
        if changes.is_active.is_some() {
            self.require_status_authority(principal)?;
        }

        let service = Service::create(changes, principal.institute_id.clone(), Utc::now())?;
        let service = self.persistence.services.create(service).await?;
        tracing::info!(service_id = %service.id, name = %service.name, "service added");

        let read = self.widest(principal, Resource::Service, Action::Read)?;
        shape(&service, &read.grant)
    }

    /// Edit a catalog entry. Switching a service on or off is a status
    /// change and needs status authority on top of the update grant.
    #[tracing::instrument(
        skip(self, principal, changes),
        fields(actor = %principal.institute_id, service_id = %id),
        err
    )]
    pub async fn update_service(
        &self,
        principal: &Principal,
        id: ServiceId,
        changes: ServiceChanges,
    ) -> WorkflowResult<JsonValue> {
        let grant = self.require(principal, Resource::Service, Action::Update, Scope::Any)?;
        check_writable(&grant, &changes.touched_fields())?;
        if changes.is_active.is_some() {
            self.require_status_authority(principal)?;
        }

        let mut service = self
            .load_service(&id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("service".into()))?;
        service.apply(changes)?;
        let service = self
            .persistence
            .services
            .save(service, ExpectedVersion::Any)
            .await?;

        let read = self.widest(principal, Resource::Service, Action::Read)?;
        shape(&service, &read.grant)
    }

    /// Orders already referring to the service stay put and cost as
    /// invalid on their next read.
    #[tracing::instrument(
        skip(self, principal),
        fields(actor = %principal.institute_id, service_id = %id),
        err
    )]
    pub async fn delete_service(&self, principal: &Principal, id: ServiceId) -> WorkflowResult<()> {
        self.require(principal, Resource::Service, Action::Delete, Scope::Any)?;
        if !self.persistence.services.delete(&id).await? {
            return Err(WorkflowError::NotFound("service".into()));
        }
        tracing::info!("service deleted");
        Ok(())
    }

    fn catalog_visibility(&self, principal: &Principal) -> (bool, bool) {
        let see_inactive = self
            .widest(principal, Resource::InActiveResource, Action::Read)
            .is_ok();
        let see_special = self
            .widest(principal, Resource::SpecialService, Action::Read)
            .is_ok();
        (see_inactive, see_special)
    }

    async fn load_service(&self, id: &ServiceId) -> WorkflowResult<Option<Service>> {
        Ok(self.persistence.services.find_by_id(id).await?)
    }
}
