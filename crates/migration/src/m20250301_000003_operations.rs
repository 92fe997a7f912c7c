use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Business {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Customer {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Appointment {
    Table,
    Id,
    BusinessId,
    CustomerId,
    EmployeeId,
    QuoteId,
    Vehicle,
    ScheduledAt,
    Notes,
    Status,
    Items,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ServiceOrder {
    Table,
    Id,
    BusinessId,
    CustomerId,
    EmployeeId,
    AppointmentId,
    Items,
    Status,
    StartedAt,
    FinishedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum InvoiceLine {
    Table,
    Id,
    BusinessId,
    ServiceOrderId,
    ItemKind,
    ItemId,
    Description,
    Quantity,
    UnitPriceCents,
    TotalCents,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Quote {
    Table,
    Id,
    BusinessId,
    CustomerId,
    Description,
    Vehicle,
    Items,
    TotalCents,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Review {
    Table,
    Id,
    BusinessId,
    CustomerId,
    ServiceOrderId,
    Rating,
    Comment,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Inspection {
    Table,
    Id,
    BusinessId,
    AppointmentId,
    Checklist,
    Markers,
    CheckInNotes,
    CheckOutNotes,
    CheckInSignatureUrl,
    CheckOutSignatureUrl,
    CheckedInAt,
    CheckedOutAt,
    CreatedBy,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Quote::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Quote::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Quote::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(Quote::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(Quote::Description).text().not_null())
                    .col(ColumnDef::new(Quote::Vehicle).string_len(256))
                    .col(ColumnDef::new(Quote::Items).json().not_null())
                    .col(
                        ColumnDef::new(Quote::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Quote::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Quote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Quote::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_business")
                            .from(Quote::Table, Quote::BusinessId)
                            .to(Business::Table, Business::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_customer")
                            .from(Quote::Table, Quote::CustomerId)
                            .to(Customer::Table, Customer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Appointment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Appointment::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Appointment::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(Appointment::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(Appointment::EmployeeId).uuid())
                    .col(ColumnDef::new(Appointment::QuoteId).uuid())
                    .col(ColumnDef::new(Appointment::Vehicle).string_len(256))
                    .col(
                        ColumnDef::new(Appointment::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Appointment::Notes).text())
                    .col(ColumnDef::new(Appointment::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Appointment::Items).json().not_null())
                    .col(
                        ColumnDef::new(Appointment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Appointment::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointment_business")
                            .from(Appointment::Table, Appointment::BusinessId)
                            .to(Business::Table, Business::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointment_customer")
                            .from(Appointment::Table, Appointment::CustomerId)
                            .to(Customer::Table, Customer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServiceOrder::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServiceOrder::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ServiceOrder::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(ServiceOrder::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(ServiceOrder::EmployeeId).uuid())
                    .col(ColumnDef::new(ServiceOrder::AppointmentId).uuid())
                    .col(ColumnDef::new(ServiceOrder::Items).json().not_null())
                    .col(
                        ColumnDef::new(ServiceOrder::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ServiceOrder::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ServiceOrder::FinishedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ServiceOrder::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrder::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_order_business")
                            .from(ServiceOrder::Table, ServiceOrder::BusinessId)
                            .to(Business::Table, Business::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_order_customer")
                            .from(ServiceOrder::Table, ServiceOrder::CustomerId)
                            .to(Customer::Table, Customer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InvoiceLine::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InvoiceLine::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InvoiceLine::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(InvoiceLine::ServiceOrderId).uuid().not_null())
                    .col(ColumnDef::new(InvoiceLine::ItemKind).string_len(16).not_null())
                    .col(ColumnDef::new(InvoiceLine::ItemId).uuid().not_null())
                    .col(
                        ColumnDef::new(InvoiceLine::Description)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InvoiceLine::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(InvoiceLine::UnitPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InvoiceLine::TotalCents).big_integer().not_null())
                    .col(
                        ColumnDef::new(InvoiceLine::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoice_line_service_order")
                            .from(InvoiceLine::Table, InvoiceLine::ServiceOrderId)
                            .to(ServiceOrder::Table, ServiceOrder::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Review::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Review::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(Review::CustomerId).uuid().not_null())
                    .col(ColumnDef::new(Review::ServiceOrderId).uuid())
                    .col(ColumnDef::new(Review::Rating).small_integer().not_null())
                    .col(ColumnDef::new(Review::Comment).text())
                    .col(
                        ColumnDef::new(Review::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_customer")
                            .from(Review::Table, Review::CustomerId)
                            .to(Customer::Table, Customer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Inspection::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Inspection::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Inspection::BusinessId).uuid().not_null())
                    .col(
                        ColumnDef::new(Inspection::AppointmentId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Inspection::Checklist).json().not_null())
                    .col(ColumnDef::new(Inspection::Markers).json().not_null())
                    .col(ColumnDef::new(Inspection::CheckInNotes).text())
                    .col(ColumnDef::new(Inspection::CheckOutNotes).text())
                    .col(
                        ColumnDef::new(Inspection::CheckInSignatureUrl)
                            .string_len(1024)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Inspection::CheckOutSignatureUrl).string_len(1024))
                    .col(
                        ColumnDef::new(Inspection::CheckedInAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Inspection::CheckedOutAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Inspection::CreatedBy).uuid())
                    .col(
                        ColumnDef::new(Inspection::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inspection_appointment")
                            .from(Inspection::Table, Inspection::AppointmentId)
                            .to(Appointment::Table, Appointment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, table) in [
            ("idx_quote_business", "quote"),
            ("idx_appointment_business", "appointment"),
            ("idx_service_order_business", "service_order"),
            ("idx_invoice_line_business", "invoice_line"),
            ("idx_review_business", "review"),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Alias::new(table))
                        .col(Alias::new("business_id"))
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Inspection::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Review::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InvoiceLine::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ServiceOrder::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Appointment::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Quote::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
