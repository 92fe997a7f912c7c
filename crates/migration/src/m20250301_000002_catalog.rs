use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Business {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Service {
    Table,
    Id,
    BusinessId,
    Name,
    Description,
    PriceCents,
    DurationMinutes,
    ImageUrl,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Product {
    Table,
    Id,
    BusinessId,
    Name,
    Sku,
    PriceCents,
    CostCents,
    StockQuantity,
    MinStock,
    ImageUrl,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StockMovement {
    Table,
    Id,
    BusinessId,
    ProductId,
    Kind,
    Quantity,
    Note,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum FiscalRule {
    Table,
    Id,
    BusinessId,
    Name,
    Ncm,
    TaxCode,
    RateBps,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PaymentMethod {
    Table,
    Id,
    BusinessId,
    Name,
    FeeBps,
    SettlementDays,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Voucher {
    Table,
    Id,
    BusinessId,
    Code,
    PercentOffBps,
    AmountOffCents,
    ExpiresAt,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn timestamps<T: Iden + 'static>(table: &mut TableCreateStatement, created: T, updated: T) {
    table
        .col(
            ColumnDef::new(created)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(updated)
                .timestamp_with_time_zone()
                .not_null(),
        );
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut service = Table::create();
        service
            .table(Service::Table)
            .if_not_exists()
            .col(ColumnDef::new(Service::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Service::BusinessId).uuid().not_null())
            .col(ColumnDef::new(Service::Name).string_len(256).not_null())
            .col(ColumnDef::new(Service::Description).text())
            .col(ColumnDef::new(Service::PriceCents).big_integer().not_null())
            .col(
                ColumnDef::new(Service::DurationMinutes)
                    .integer()
                    .not_null()
                    .default(60),
            )
            .col(ColumnDef::new(Service::ImageUrl).string_len(1024))
            .col(
                ColumnDef::new(Service::Active)
                    .boolean()
                    .not_null()
                    .default(true),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_service_business")
                    .from(Service::Table, Service::BusinessId)
                    .to(Business::Table, Business::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        timestamps(&mut service, Service::CreatedAt, Service::UpdatedAt);
        manager.create_table(service.to_owned()).await?;

        let mut product = Table::create();
        product
            .table(Product::Table)
            .if_not_exists()
            .col(ColumnDef::new(Product::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Product::BusinessId).uuid().not_null())
            .col(ColumnDef::new(Product::Name).string_len(256).not_null())
            .col(ColumnDef::new(Product::Sku).string_len(64))
            .col(ColumnDef::new(Product::PriceCents).big_integer().not_null())
            .col(
                ColumnDef::new(Product::CostCents)
                    .big_integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(Product::StockQuantity)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(Product::MinStock)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(Product::ImageUrl).string_len(1024))
            .col(
                ColumnDef::new(Product::Active)
                    .boolean()
                    .not_null()
                    .default(true),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_product_business")
                    .from(Product::Table, Product::BusinessId)
                    .to(Business::Table, Business::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        timestamps(&mut product, Product::CreatedAt, Product::UpdatedAt);
        manager.create_table(product.to_owned()).await?;

        manager
            .create_table(
                Table::create()
                    .table(StockMovement::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockMovement::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StockMovement::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(StockMovement::ProductId).uuid().not_null())
                    .col(ColumnDef::new(StockMovement::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(StockMovement::Quantity).integer().not_null())
                    .col(ColumnDef::new(StockMovement::Note).text())
                    .col(ColumnDef::new(StockMovement::CreatedBy).uuid())
                    .col(
                        ColumnDef::new(StockMovement::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_movement_product")
                            .from(StockMovement::Table, StockMovement::ProductId)
                            .to(Product::Table, Product::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_stock_movement_product")
                    .table(StockMovement::Table)
                    .col(StockMovement::ProductId)
                    .to_owned(),
            )
            .await?;

        let mut fiscal_rule = Table::create();
        fiscal_rule
            .table(FiscalRule::Table)
            .if_not_exists()
            .col(ColumnDef::new(FiscalRule::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(FiscalRule::BusinessId).uuid().not_null())
            .col(ColumnDef::new(FiscalRule::Name).string_len(256).not_null())
            .col(ColumnDef::new(FiscalRule::Ncm).string_len(16))
            .col(ColumnDef::new(FiscalRule::TaxCode).string_len(32).not_null())
            .col(ColumnDef::new(FiscalRule::RateBps).integer().not_null())
            .col(
                ColumnDef::new(FiscalRule::Active)
                    .boolean()
                    .not_null()
                    .default(true),
            );
        timestamps(&mut fiscal_rule, FiscalRule::CreatedAt, FiscalRule::UpdatedAt);
        manager.create_table(fiscal_rule.to_owned()).await?;

        let mut payment_method = Table::create();
        payment_method
            .table(PaymentMethod::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(PaymentMethod::Id)
                    .uuid()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(PaymentMethod::BusinessId).uuid().not_null())
            .col(ColumnDef::new(PaymentMethod::Name).string_len(128).not_null())
            .col(
                ColumnDef::new(PaymentMethod::FeeBps)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(PaymentMethod::SettlementDays)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(PaymentMethod::Active)
                    .boolean()
                    .not_null()
                    .default(true),
            );
        timestamps(
            &mut payment_method,
            PaymentMethod::CreatedAt,
            PaymentMethod::UpdatedAt,
        );
        manager.create_table(payment_method.to_owned()).await?;

        let mut voucher = Table::create();
        voucher
            .table(Voucher::Table)
            .if_not_exists()
            .col(ColumnDef::new(Voucher::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Voucher::BusinessId).uuid().not_null())
            .col(ColumnDef::new(Voucher::Code).string_len(64).not_null())
            .col(ColumnDef::new(Voucher::PercentOffBps).integer())
            .col(ColumnDef::new(Voucher::AmountOffCents).big_integer())
            .col(ColumnDef::new(Voucher::ExpiresAt).timestamp_with_time_zone())
            .col(
                ColumnDef::new(Voucher::Active)
                    .boolean()
                    .not_null()
                    .default(true),
            );
        timestamps(&mut voucher, Voucher::CreatedAt, Voucher::UpdatedAt);
        manager.create_table(voucher.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_voucher_business_code")
                    .table(Voucher::Table)
                    .col(Voucher::BusinessId)
                    .col(Voucher::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        for (name, table) in [
            ("idx_service_business", "service"),
            ("idx_product_business", "product"),
            ("idx_fiscal_rule_business", "fiscal_rule"),
            ("idx_payment_method_business", "payment_method"),
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
            .drop_table(Table::drop().table(Voucher::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentMethod::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FiscalRule::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockMovement::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Product::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Service::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
