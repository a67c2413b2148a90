//! Migration creating the OAuth2 client, grant and token tables.
//!
//! Grants and tokens belong to a client and are removed together with it.
//! Token rotation relies on the `(client_id, user_id)` unique index: there is
//! at most one live token per pair.

use sea_orm_migration::prelude::*;

use crate::m20261016_090000_add_identity_tables::{Users, audit_columns};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. OAuth2 Clients
        manager
            .create_table(
                audit_columns(
                    Table::create()
                        .table(OAuth2Client::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OAuth2Client::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OAuth2Client::Secret).string().not_null())
                        .col(
                            ColumnDef::new(OAuth2Client::IsConfidential)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(OAuth2Client::Name).string().not_null())
                        .col(ColumnDef::new(OAuth2Client::Description).text().null())
                        .col(ColumnDef::new(OAuth2Client::RedirectUris).text().not_null())
                        .col(
                            ColumnDef::new(OAuth2Client::DefaultScopes)
                                .text()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OAuth2Client::UserId).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_oauth2_client_user_id")
                                .from(OAuth2Client::Table, OAuth2Client::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        ),
                    OAuth2Client::Table,
                )
                .to_owned(),
            )
            .await?;

        // 2. OAuth2 Grants (authorization codes, short-lived)
        manager
            .create_table(
                Table::create()
                    .table(OAuth2Grant::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Grant::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuth2Grant::ClientId).string().not_null())
                    .col(ColumnDef::new(OAuth2Grant::UserId).string().not_null())
                    .col(ColumnDef::new(OAuth2Grant::RedirectUri).string().not_null())
                    .col(ColumnDef::new(OAuth2Grant::Scopes).text().not_null())
                    .col(ColumnDef::new(OAuth2Grant::CodeChallenge).string().null())
                    .col(
                        ColumnDef::new(OAuth2Grant::CodeChallengeMethod)
                            .string_len(16)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Grant::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Grant::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_grant_client_id")
                            .from(OAuth2Grant::Table, OAuth2Grant::ClientId)
                            .to(OAuth2Client::Table, OAuth2Client::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_grant_user_id")
                            .from(OAuth2Grant::Table, OAuth2Grant::UserId)
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
                    .name("uq_oauth2_grant_client_code")
                    .table(OAuth2Grant::Table)
                    .col(OAuth2Grant::ClientId)
                    .col(OAuth2Grant::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 3. OAuth2 Tokens (bearer + refresh pair)
        manager
            .create_table(
                Table::create()
                    .table(OAuth2Token::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Token::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::AccessToken)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::RefreshToken)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::TokenType)
                            .string_len(16)
                            .not_null()
                            .default("Bearer"),
                    )
                    .col(ColumnDef::new(OAuth2Token::ClientId).string().not_null())
                    .col(ColumnDef::new(OAuth2Token::UserId).string().not_null())
                    .col(ColumnDef::new(OAuth2Token::Scopes).text().not_null())
                    .col(
                        ColumnDef::new(OAuth2Token::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Token::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_token_client_id")
                            .from(OAuth2Token::Table, OAuth2Token::ClientId)
                            .to(OAuth2Client::Table, OAuth2Client::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_token_user_id")
                            .from(OAuth2Token::Table, OAuth2Token::UserId)
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
                    .name("uq_oauth2_token_client_user")
                    .table(OAuth2Token::Table)
                    .col(OAuth2Token::ClientId)
                    .col(OAuth2Token::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuth2Token::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Grant::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Client::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum OAuth2Client {
    #[sea_orm(iden = "oauth2_client")]
    Table,
    Id,
    Secret,
    IsConfidential,
    Name,
    Description,
    RedirectUris,
    DefaultScopes,
    UserId,
}

#[derive(DeriveIden, Clone, Copy)]
enum OAuth2Grant {
    #[sea_orm(iden = "oauth2_grant")]
    Table,
    Code,
    ClientId,
    UserId,
    RedirectUri,
    Scopes,
    CodeChallenge,
    CodeChallengeMethod,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum OAuth2Token {
    #[sea_orm(iden = "oauth2_token")]
    Table,
    Id,
    AccessToken,
    RefreshToken,
    TokenType,
    ClientId,
    UserId,
    Scopes,
    ExpiresAt,
    CreatedAt,
}
