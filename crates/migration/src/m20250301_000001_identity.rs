use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Account {
    Table,
    Id,
    Email,
    PasswordHash,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Business {
    Table,
    Id,
    OwnerAccountId,
    Name,
    TaxId,
    Phone,
    PostalCode,
    Address,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
    AccountId,
    BusinessId,
    Name,
    Permissions,
    CommissionBps,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Customer {
    Table,
    Id,
    AccountId,
    BusinessId,
    Name,
    Email,
    Phone,
    TaxId,
    CreatedAt,
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
                    .table(Account::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Account::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Account::Email)
                            .string_len(320)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Account::PasswordHash).string().not_null())
                    .col(
                        ColumnDef::new(Account::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Business::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Business::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Business::OwnerAccountId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Business::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Business::TaxId).string_len(32))
                    .col(ColumnDef::new(Business::Phone).string_len(64))
                    .col(ColumnDef::new(Business::PostalCode).string_len(16))
                    .col(ColumnDef::new(Business::Address).string_len(512))
                    .col(
                        ColumnDef::new(Business::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Business::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_business_owner_account")
                            .from(Business::Table, Business::OwnerAccountId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Employee::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Employee::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Employee::AccountId).uuid().not_null())
                    .col(ColumnDef::new(Employee::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(Employee::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Employee::Permissions).json().not_null())
                    .col(
                        ColumnDef::new(Employee::CommissionBps)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Employee::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Employee::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_business")
                            .from(Employee::Table, Employee::BusinessId)
                            .to(Business::Table, Business::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_employee_account")
                    .table(Employee::Table)
                    .col(Employee::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Customer::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Customer::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Customer::AccountId).uuid())
                    .col(ColumnDef::new(Customer::BusinessId).uuid().not_null())
                    .col(ColumnDef::new(Customer::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Customer::Email).string_len(320))
                    .col(ColumnDef::new(Customer::Phone).string_len(64))
                    .col(ColumnDef::new(Customer::TaxId).string_len(32))
                    .col(
                        ColumnDef::new(Customer::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Customer::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_customer_business")
                            .from(Customer::Table, Customer::BusinessId)
                            .to(Business::Table, Business::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_customer_account")
                    .table(Customer::Table)
                    .col(Customer::AccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Customer::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Employee::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Business::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Account::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
