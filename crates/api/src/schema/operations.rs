use async_graphql::{Context, InputObject, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use entity::{appointment, employee, invoice_line, quote, review, service_order};
use platform_api::ApiError;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, QueryFilter, QueryOrder,
};

use super::{
    current_principal, database, gql,
    nodes::{AppointmentNode, InvoiceLineNode, QuoteNode, ReviewNode, ServiceOrderNode},
    optional_text, parse_optional_uuid, parse_uuid, require, require_customer,
};
use crate::{
    catalog::LineItemRef,
    db_err,
    identity::{Permission, Role},
    repo,
    workflow::{self, AppointmentRequest, QuoteRequest},
};

#[derive(Clone, Debug, InputObject)]
pub struct QuoteRequestInput {
    pub description: String,
    pub vehicle: Option<String>,
    pub items: Vec<LineItemRef>,
}

#[derive(Clone, Debug, InputObject)]
pub struct AppointmentRequestInput {
    pub scheduled_at: DateTime<Utc>,
    pub vehicle: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<LineItemRef>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct QuoteApproval {
    pub quote: QuoteNode,
    pub appointment: AppointmentNode,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AppointmentApproval {
    pub appointment: AppointmentNode,
    pub service_order: ServiceOrderNode,
}

#[derive(Default)]
pub struct OperationsQuery;

#[Object]
impl OperationsQuery {
    /// Agenda, optionally limited to `[from, to)`.
    async fn appointments(
        &self,
        ctx: &Context<'_>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> async_graphql::Result<Vec<AppointmentNode>> {
        let principal = require(ctx, Permission::Agenda)?;
        let db = database(ctx)?;
        let mut query = repo::list_query::<appointment::Entity>(principal.business_id);
        if let Some(from) = from {
            query = query.filter(appointment::Column::ScheduledAt.gte(from.fixed_offset()));
        }
        if let Some(to) = to {
            query = query.filter(appointment::Column::ScheduledAt.lt(to.fixed_offset()));
        }
        let records = query
            .order_by_asc(appointment::Column::ScheduledAt)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(AppointmentNode::from).collect())
    }

    async fn service_order(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<ServiceOrderNode> {
        let principal = require(ctx, Permission::Orders)?;
        let db = database(ctx)?;
        repo::get::<service_order::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "service order",
        )
        .await
        .map(ServiceOrderNode::from)
        .map_err(gql)
    }

    async fn invoice_lines(
        &self,
        ctx: &Context<'_>,
        service_order_id: ID,
    ) -> async_graphql::Result<Vec<InvoiceLineNode>> {
        let principal = require(ctx, Permission::Orders)?;
        let db = database(ctx)?;
        let records = repo::list_query::<invoice_line::Entity>(principal.business_id)
            .filter(invoice_line::Column::ServiceOrderId.eq(parse_uuid(&service_order_id)?))
            .order_by_asc(invoice_line::Column::CreatedAt)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(InvoiceLineNode::from).collect())
    }

    async fn reviews(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<ReviewNode>> {
        let principal = current_principal(ctx)?;
        let db = database(ctx)?;
        let mut query = repo::list_query::<review::Entity>(principal.business_id);
        if principal.role == Role::Customer {
            if let Some(customer_id) = principal.customer_id {
                query = query.filter(review::Column::CustomerId.eq(customer_id));
            }
        }
        let records = query
            .order_by_desc(review::Column::CreatedAt)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(ReviewNode::from).collect())
    }

    async fn my_quotes(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<QuoteNode>> {
        let (principal, customer_id) = require_customer(ctx)?;
        let db = database(ctx)?;
        let records = repo::list_query::<quote::Entity>(principal.business_id)
            .filter(quote::Column::CustomerId.eq(customer_id))
            .order_by_desc(quote::Column::CreatedAt)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(QuoteNode::from).collect())
    }

    async fn my_appointments(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<AppointmentNode>> {
        let (principal, customer_id) = require_customer(ctx)?;
        let db = database(ctx)?;
        let records = repo::list_query::<appointment::Entity>(principal.business_id)
            .filter(appointment::Column::CustomerId.eq(customer_id))
            .order_by_desc(appointment::Column::ScheduledAt)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(AppointmentNode::from).collect())
    }

    async fn my_service_orders(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<ServiceOrderNode>> {
        let (principal, customer_id) = require_customer(ctx)?;
        let db = database(ctx)?;
        let records = repo::list_query::<service_order::Entity>(principal.business_id)
            .filter(service_order::Column::CustomerId.eq(customer_id))
            .order_by_desc(service_order::Column::CreatedAt)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(ServiceOrderNode::from).collect())
    }
}

#[derive(Default)]
pub struct OperationsMutation;

#[Object]
impl OperationsMutation {
    async fn request_quote(
        &self,
        ctx: &Context<'_>,
        input: QuoteRequestInput,
    ) -> async_graphql::Result<QuoteNode> {
        let (principal, customer_id) = require_customer(ctx)?;
        let db = database(ctx)?;
        let record = workflow::request_quote(
            db.as_ref(),
            QuoteRequest {
                business_id: principal.business_id,
                customer_id,
                description: input.description,
                vehicle: input.vehicle,
                items: input.items,
            },
        )
        .await
        .map_err(gql)?;
        Ok(record.into())
    }

    /// Staff-side quote, recorded on behalf of a customer.
    async fn create_quote(
        &self,
        ctx: &Context<'_>,
        customer_id: ID,
        input: QuoteRequestInput,
    ) -> async_graphql::Result<QuoteNode> {
        let principal = require(ctx, Permission::Quotes)?;
        let db = database(ctx)?;
        let customer = repo::get::<entity::customer::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&customer_id)?,
            "customer",
        )
        .await
        .map_err(gql)?;
        let record = workflow::request_quote(
            db.as_ref(),
            QuoteRequest {
                business_id: principal.business_id,
                customer_id: customer.id,
                description: input.description,
                vehicle: input.vehicle,
                items: input.items,
            },
        )
        .await
        .map_err(gql)?;
        Ok(record.into())
    }

    async fn approve_quote(
        &self,
        ctx: &Context<'_>,
        id: ID,
        scheduled_at: DateTime<Utc>,
        employee_id: Option<ID>,
    ) -> async_graphql::Result<QuoteApproval> {
        let principal = require(ctx, Permission::Quotes)?;
        let db = database(ctx)?;
        let employee_id = parse_optional_uuid(employee_id.as_ref())?;
        if let Some(employee_id) = employee_id {
            repo::get::<employee::Entity, _>(db.as_ref(), principal.business_id, employee_id, "employee")
                .await
                .map_err(gql)?;
        }
        let (quote, appointment) = workflow::approve_quote(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            scheduled_at.fixed_offset(),
            employee_id,
        )
        .await
        .map_err(gql)?;
        Ok(QuoteApproval {
            quote: quote.into(),
            appointment: appointment.into(),
        })
    }

    /// Customer accepts a quote that is waiting on them and picks a date.
    async fn accept_quote(
        &self,
        ctx: &Context<'_>,
        id: ID,
        scheduled_at: DateTime<Utc>,
    ) -> async_graphql::Result<QuoteApproval> {
        let (principal, customer_id) = require_customer(ctx)?;
        let db = database(ctx)?;
        let quote_id = parse_uuid(&id)?;
        let existing = repo::get::<quote::Entity, _>(db.as_ref(), principal.business_id, quote_id, "quote")
            .await
            .map_err(gql)?;
        if existing.customer_id != customer_id {
            return Err(gql(ApiError::NotFound("quote")));
        }
        if existing.status != quote::Status::AwaitingCustomer {
            return Err(gql(ApiError::Conflict(
                "quote is not waiting for the customer".into(),
            )));
        }
        let (quote, appointment) = workflow::approve_quote(
            db.as_ref(),
            principal.business_id,
            quote_id,
            scheduled_at.fixed_offset(),
            None,
        )
        .await
        .map_err(gql)?;
        Ok(QuoteApproval {
            quote: quote.into(),
            appointment: appointment.into(),
        })
    }

    async fn request_appointment(
        &self,
        ctx: &Context<'_>,
        input: AppointmentRequestInput,
    ) -> async_graphql::Result<AppointmentNode> {
        let (principal, customer_id) = require_customer(ctx)?;
        let db = database(ctx)?;
        let record = workflow::request_appointment(
            db.as_ref(),
            AppointmentRequest {
                business_id: principal.business_id,
                customer_id,
                scheduled_at: input.scheduled_at.fixed_offset(),
                vehicle: input.vehicle,
                notes: input.notes,
                items: input.items,
            },
        )
        .await
        .map_err(gql)?;
        Ok(record.into())
    }

    async fn approve_appointment(
        &self,
        ctx: &Context<'_>,
        id: ID,
        employee_id: Option<ID>,
    ) -> async_graphql::Result<AppointmentApproval> {
        let principal = require(ctx, Permission::Agenda)?;
        let db = database(ctx)?;
        let employee_id = parse_optional_uuid(employee_id.as_ref())?;
        if let Some(employee_id) = employee_id {
            repo::get::<employee::Entity, _>(db.as_ref(), principal.business_id, employee_id, "employee")
                .await
                .map_err(gql)?;
        }
        let (appointment, order) = workflow::approve_appointment(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            employee_id,
        )
        .await
        .map_err(gql)?;
        Ok(AppointmentApproval {
            appointment: appointment.into(),
            service_order: order.into(),
        })
    }

    async fn decline_appointment(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<AppointmentNode> {
        let principal = require(ctx, Permission::Agenda)?;
        let db = database(ctx)?;
        let record = workflow::close_appointment(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            appointment::Status::Declined,
        )
        .await
        .map_err(gql)?;
        Ok(record.into())
    }

    /// Customers may cancel their own appointments; staff need agenda access.
    async fn cancel_appointment(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<AppointmentNode> {
        let principal = current_principal(ctx)?;
        let db = database(ctx)?;
        let appointment_id = parse_uuid(&id)?;
        match principal.customer_id {
            Some(customer_id) if principal.role == Role::Customer => {
                let existing = repo::get::<appointment::Entity, _>(
                    db.as_ref(),
                    principal.business_id,
                    appointment_id,
                    "appointment",
                )
                .await
                .map_err(gql)?;
                if existing.customer_id != customer_id {
                    return Err(gql(ApiError::NotFound("appointment")));
                }
            }
            _ => {
                require(ctx, Permission::Agenda)?;
            }
        }
        let record = workflow::close_appointment(
            db.as_ref(),
            principal.business_id,
            appointment_id,
            appointment::Status::Cancelled,
        )
        .await
        .map_err(gql)?;
        Ok(record.into())
    }

    async fn assign_service_order(
        &self,
        ctx: &Context<'_>,
        id: ID,
        employee_id: Option<ID>,
    ) -> async_graphql::Result<ServiceOrderNode> {
        let principal = require(ctx, Permission::Orders)?;
        let db = database(ctx)?;
        let employee_id = parse_optional_uuid(employee_id.as_ref())?;
        if let Some(employee_id) = employee_id {
            repo::get::<employee::Entity, _>(db.as_ref(), principal.business_id, employee_id, "employee")
                .await
                .map_err(gql)?;
        }
        let existing = repo::get::<service_order::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "service order",
        )
        .await
        .map_err(gql)?;
        let mut active: service_order::ActiveModel = existing.into();
        active.employee_id = Set(employee_id);
        active.updated_at = Set(Utc::now().into());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn add_invoice_line(
        &self,
        ctx: &Context<'_>,
        service_order_id: ID,
        item: LineItemRef,
        #[graphql(default = 1)] quantity: i32,
    ) -> async_graphql::Result<InvoiceLineNode> {
        let principal = require(ctx, Permission::Orders)?;
        let db = database(ctx)?;
        let line = workflow::add_invoice_line(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&service_order_id)?,
            item,
            quantity,
        )
        .await
        .map_err(gql)?;
        Ok(line.into())
    }

    async fn remove_invoice_line(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Orders)?;
        let db = database(ctx)?;
        repo::delete::<invoice_line::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "invoice line",
        )
        .await
        .map_err(gql)?;
        Ok(true)
    }

    async fn submit_review(
        &self,
        ctx: &Context<'_>,
        rating: i16,
        comment: Option<String>,
        service_order_id: Option<ID>,
    ) -> async_graphql::Result<ReviewNode> {
        let (principal, customer_id) = require_customer(ctx)?;
        let db = database(ctx)?;
        let record = workflow::submit_review(
            db.as_ref(),
            principal.business_id,
            customer_id,
            parse_optional_uuid(service_order_id.as_ref())?,
            rating,
            optional_text(comment),
        )
        .await
        .map_err(gql)?;
        Ok(record.into())
    }
}
