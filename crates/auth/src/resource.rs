/// Resource names known to the policy table.
///
/// The last three are synthetic: they name no stored document and only gate
/// visibility of inactive catalog entries, administrative status changes and
/// special (invitation-only) services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    User,
    UserInfo,
    Order,
    Cart,
    Service,
    Parameter,
    CollectionType,
    News,
    Notification,
    Collector,
    Courier,
    CourierInfo,
    InActiveResource,
    ChangeResourceStatus,
    SpecialService,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::User => "User",
            Resource::UserInfo => "UserInfo",
            Resource::Order => "Order",
            Resource::Cart => "Cart",
            Resource::Service => "Service",
            Resource::Parameter => "Parameter",
            Resource::CollectionType => "CollectionType",
            Resource::News => "News",
            Resource::Notification => "Notification",
            Resource::Collector => "Collector",
            Resource::Courier => "Courier",
            Resource::CourierInfo => "CourierInfo",
            Resource::InActiveResource => "InActiveResource",
            Resource::ChangeResourceStatus => "changeResourceStatus",
            Resource::SpecialService => "SpecialService",
        }
    }
}

impl AsRef<str> for Resource {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
