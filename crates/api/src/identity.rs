use std::collections::BTreeSet;

use async_graphql::Enum;
use async_trait::async_trait;
use entity::{business, customer, employee};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use uuid::Uuid;

/// Back-office areas an employee can be granted.
#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Permission {
    #[graphql(name = "AGENDA")]
    Agenda,
    #[graphql(name = "ORDERS")]
    Orders,
    #[graphql(name = "QUOTES")]
    Quotes,
    #[graphql(name = "CATALOG")]
    Catalog,
    #[graphql(name = "STOCK")]
    Stock,
    #[graphql(name = "FINANCE")]
    Finance,
    #[graphql(name = "FISCAL")]
    Fiscal,
    #[graphql(name = "REPORTS")]
    Reports,
    #[graphql(name = "INSPECTIONS")]
    Inspections,
    #[graphql(name = "MARKETING")]
    Marketing,
    #[graphql(name = "CUSTOMERS")]
    Customers,
    #[graphql(name = "EMPLOYEES")]
    Employees,
}

impl Permission {
    pub const ALL: [Permission; 12] = [
        Permission::Agenda,
        Permission::Orders,
        Permission::Quotes,
        Permission::Catalog,
        Permission::Stock,
        Permission::Finance,
        Permission::Fiscal,
        Permission::Reports,
        Permission::Inspections,
        Permission::Marketing,
        Permission::Customers,
        Permission::Employees,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Agenda => "agenda",
            Permission::Orders => "orders",
            Permission::Quotes => "quotes",
            Permission::Catalog => "catalog",
            Permission::Stock => "stock",
            Permission::Finance => "finance",
            Permission::Fiscal => "fiscal",
            Permission::Reports => "reports",
            Permission::Inspections => "inspections",
            Permission::Marketing => "marketing",
            Permission::Customers => "customers",
            Permission::Employees => "employees",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str().eq_ignore_ascii_case(value))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Permissions {
    /// Business owners.
    All,
    Granted(BTreeSet<Permission>),
}

impl Permissions {
    pub fn none() -> Self {
        Permissions::Granted(BTreeSet::new())
    }

    /// Unknown names are dropped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Permissions::Granted(
            names
                .into_iter()
                .filter_map(|name| Permission::parse(name.as_ref()))
                .collect(),
        )
    }

    /// Reads the JSON array stored on an employee record.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let names = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Self::from_names(names)
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match self {
            Permissions::All => true,
            Permissions::Granted(set) => set.contains(&permission),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            Permissions::All => vec!["*".to_string()],
            Permissions::Granted(set) => set.iter().map(|p| p.as_str().to_string()).collect(),
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    #[graphql(name = "BUSINESS")]
    Business,
    #[graphql(name = "EMPLOYEE")]
    Employee,
    #[graphql(name = "CUSTOMER")]
    Customer,
}

/// The resolved identity attached to each request.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
    pub business_id: Uuid,
    pub role: Role,
    pub permissions: Permissions,
    pub employee_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub display_name: String,
}

impl Principal {
    pub fn can(&self, permission: Permission) -> bool {
        self.role != Role::Customer && self.permissions.allows(permission)
    }

    fn for_business(account_id: Uuid, record: business::Model) -> Self {
        Self {
            account_id,
            business_id: record.id,
            role: Role::Business,
            permissions: Permissions::All,
            employee_id: None,
            customer_id: None,
            display_name: record.name,
        }
    }

    fn for_employee(account_id: Uuid, record: employee::Model) -> Self {
        Self {
            account_id,
            business_id: record.business_id,
            role: Role::Employee,
            permissions: Permissions::from_json(&record.permissions),
            employee_id: Some(record.id),
            customer_id: None,
            display_name: record.name,
        }
    }

    fn for_customer(account_id: Uuid, record: customer::Model) -> Self {
        Self {
            account_id,
            business_id: record.business_id,
            role: Role::Customer,
            permissions: Permissions::none(),
            employee_id: None,
            customer_id: Some(record.id),
            display_name: record.name,
        }
    }
}

#[derive(Clone, Debug)]
pub enum SessionState {
    Loading,
    Unauthenticated,
    Business(Principal),
    Employee(Principal),
    Customer(Principal),
}

impl SessionState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionState::Business(p) | SessionState::Employee(p) | SessionState::Customer(p) => {
                Some(p)
            }
            SessionState::Loading | SessionState::Unauthenticated => None,
        }
    }

    fn from_principal(principal: Principal) -> Self {
        match principal.role {
            Role::Business => SessionState::Business(principal),
            Role::Employee => SessionState::Employee(principal),
            Role::Customer => SessionState::Customer(principal),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { account_id: Uuid },
    SignedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Resolved,
    SignedOut,
    /// Authenticated account with no business, employee or customer record.
    ForcedSignOut,
}

/// Lookups used to decide which role an account plays.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn business_for(&self, account_id: Uuid) -> Result<Option<business::Model>, DbErr>;
    async fn employee_for(&self, account_id: Uuid) -> Result<Option<employee::Model>, DbErr>;
    async fn customer_for(&self, account_id: Uuid) -> Result<Option<customer::Model>, DbErr>;
}

pub struct DbRoleDirectory<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> DbRoleDirectory<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> RoleDirectory for DbRoleDirectory<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn business_for(&self, account_id: Uuid) -> Result<Option<business::Model>, DbErr> {
        business::Entity::find()
            .filter(business::Column::OwnerAccountId.eq(account_id))
            .one(self.conn)
            .await
    }

    async fn employee_for(&self, account_id: Uuid) -> Result<Option<employee::Model>, DbErr> {
        employee::Entity::find()
            .filter(employee::Column::AccountId.eq(account_id))
            .one(self.conn)
            .await
    }

    async fn customer_for(&self, account_id: Uuid) -> Result<Option<customer::Model>, DbErr> {
        customer::Entity::find()
            .filter(customer::Column::AccountId.eq(account_id))
            .one(self.conn)
            .await
    }
}

/// Probe business, then employee, then customer; first match wins.
pub async fn resolve_principal<D>(
    directory: &D,
    account_id: Uuid,
) -> Result<Option<Principal>, DbErr>
where
    D: RoleDirectory + ?Sized,
{
    if let Some(record) = directory.business_for(account_id).await? {
        return Ok(Some(Principal::for_business(account_id, record)));
    }
    if let Some(record) = directory.employee_for(account_id).await? {
        return Ok(Some(Principal::for_employee(account_id, record)));
    }
    if let Some(record) = directory.customer_for(account_id).await? {
        return Ok(Some(Principal::for_customer(account_id, record)));
    }
    Ok(None)
}

/// Follows auth-state events and re-resolves the role on each one.
#[derive(Debug)]
pub struct SessionTracker {
    state: SessionState,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self {
            state: SessionState::Loading,
        }
    }
}

impl SessionTracker {
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub async fn observe<D>(&mut self, directory: &D, event: AuthEvent) -> Result<Transition, DbErr>
    where
        D: RoleDirectory + ?Sized,
    {
        match event {
            AuthEvent::SignedOut => {
                self.state = SessionState::Unauthenticated;
                Ok(Transition::SignedOut)
            }
            AuthEvent::SignedIn { account_id } => {
                self.state = SessionState::Loading;
                match resolve_principal(directory, account_id).await? {
                    Some(principal) => {
                        tracing::debug!(%account_id, role = ?principal.role, "session resolved");
                        self.state = SessionState::from_principal(principal);
                        Ok(Transition::Resolved)
                    }
                    None => {
                        tracing::warn!(%account_id, "account has no role record, signing out");
                        self.state = SessionState::Unauthenticated;
                        Ok(Transition::ForcedSignOut)
                    }
                }
            }
        }
    }
}
