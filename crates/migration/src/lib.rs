pub use sea_orm_migration::prelude::*;

mod m20261016_090000_add_identity_tables;
mod m20261016_090100_add_oauth2_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261016_090000_add_identity_tables::Migration),
            Box::new(m20261016_090100_add_oauth2_tables::Migration),
        ]
    }
}
