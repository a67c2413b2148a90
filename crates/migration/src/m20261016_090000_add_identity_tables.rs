//! Migration creating the identity and collection permission tables.
//!
//! Creates tables for:
//! - users: Accounts (soft-deleted by anonymisation, never removed)
//! - collections: Library sigels
//! - permissions: Per (user, collection) capability rows
//! - failed_login_attempt: Sliding-window login throttle
//! - password_reset: Single-use password reset codes

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. Users. Audit columns point back into the same table.
        manager
            .create_table(
                audit_columns(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::FullName).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string_len(255).null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::IsAdmin)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Users::LastLoginAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Users::TosApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        ),
                    Users::Table,
                )
                .to_owned(),
            )
            .await?;

        // 2. Collections
        manager
            .create_table(
                audit_columns(
                    Table::create()
                        .table(Collections::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Collections::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Collections::Code)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Collections::FriendlyName).string().not_null())
                        .col(
                            ColumnDef::new(Collections::Category)
                                .string_len(32)
                                .not_null()
                                .default("uncategorized"),
                        )
                        .col(
                            ColumnDef::new(Collections::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Collections::IsSuper)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        // Succession pointers are informational codes, not foreign keys
                        .col(ColumnDef::new(Collections::Replaces).string_len(255).null())
                        .col(
                            ColumnDef::new(Collections::ReplacedBy)
                                .string_len(255)
                                .null(),
                        ),
                    Collections::Table,
                )
                .to_owned(),
            )
            .await?;

        // 3. Permissions
        manager
            .create_table(
                audit_columns(
                    Table::create()
                        .table(Permissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Permissions::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Permissions::UserId).string().not_null())
                        .col(ColumnDef::new(Permissions::CollectionId).string().not_null())
                        .col(
                            ColumnDef::new(Permissions::Registrant)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Permissions::Cataloger)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Permissions::CatalogingAdmin)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_permissions_user_id")
                                .from(Permissions::Table, Permissions::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_permissions_collection_id")
                                .from(Permissions::Table, Permissions::CollectionId)
                                .to(Collections::Table, Collections::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        ),
                    Permissions::Table,
                )
                .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_permissions_user_collection")
                    .table(Permissions::Table)
                    .col(Permissions::UserId)
                    .col(Permissions::CollectionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 4. Failed login attempts (sliding-window counter)
        manager
            .create_table(
                Table::create()
                    .table(FailedLoginAttempt::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FailedLoginAttempt::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FailedLoginAttempt::Username)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FailedLoginAttempt::RemoteAddr)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FailedLoginAttempt::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_failed_login_attempt_pair")
                    .table(FailedLoginAttempt::Table)
                    .col(FailedLoginAttempt::Username)
                    .col(FailedLoginAttempt::RemoteAddr)
                    .to_owned(),
            )
            .await?;

        // 5. Password resets
        manager
            .create_table(
                Table::create()
                    .table(PasswordReset::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PasswordReset::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PasswordReset::UserId).string().not_null())
                    .col(
                        ColumnDef::new(PasswordReset::Code)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(PasswordReset::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PasswordReset::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordReset::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordReset::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_password_reset_user_id")
                            .from(PasswordReset::Table, PasswordReset::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_password_reset_user_id")
                    .table(PasswordReset::Table)
                    .col(PasswordReset::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PasswordReset::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FailedLoginAttempt::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Collections::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

/// Appends `created_by`/`created_at`/`modified_by`/`modified_at` to a table.
///
/// The `*_by` columns reference `users.id` and are nulled rather than cascaded,
/// so audit rows survive whatever happens to the referenced account.
pub(crate) fn audit_columns<T>(stmt: &mut TableCreateStatement, table: T) -> &mut TableCreateStatement
where
    T: Iden + Copy + 'static,
{
    let name = table.to_string();
    stmt.col(ColumnDef::new(Audit::CreatedBy).string().null())
        .col(
            ColumnDef::new(Audit::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(ColumnDef::new(Audit::ModifiedBy).string().null())
        .col(
            ColumnDef::new(Audit::ModifiedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{name}_created_by"))
                .from(table, Audit::CreatedBy)
                .to(Users::Table, Users::Id)
                .on_delete(ForeignKeyAction::SetNull),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{name}_modified_by"))
                .from(table, Audit::ModifiedBy)
                .to(Users::Table, Users::Id)
                .on_delete(ForeignKeyAction::SetNull),
        )
}

#[derive(DeriveIden, Clone, Copy)]
enum Audit {
    CreatedBy,
    CreatedAt,
    ModifiedBy,
    ModifiedAt,
}

#[derive(DeriveIden, Clone, Copy)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    FullName,
    PasswordHash,
    IsActive,
    IsAdmin,
    LastLoginAt,
    TosApprovedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum Collections {
    Table,
    Id,
    Code,
    FriendlyName,
    Category,
    IsActive,
    IsSuper,
    Replaces,
    ReplacedBy,
}

#[derive(DeriveIden, Clone, Copy)]
enum Permissions {
    Table,
    Id,
    UserId,
    CollectionId,
    Registrant,
    Cataloger,
    CatalogingAdmin,
}

#[derive(DeriveIden, Clone, Copy)]
enum FailedLoginAttempt {
    Table,
    Id,
    Username,
    RemoteAddr,
    CreatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum PasswordReset {
    Table,
    Id,
    UserId,
    Code,
    IsActive,
    ExpiresAt,
    CreatedAt,
    ModifiedAt,
}
