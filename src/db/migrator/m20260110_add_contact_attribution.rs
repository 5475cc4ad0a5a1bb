use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !manager
            .has_column("clients", "last_contacted_by_user_id")
            .await?
        {
            manager
                .alter_table(
                    Table::alter()
                        .table(Clients::Table)
                        .add_column(
                            ColumnDef::new(Clients::LastContactedByUserId)
                                .integer()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;
        }

        if !manager.has_column("sales", "created_by_user_id").await? {
            manager
                .alter_table(
                    Table::alter()
                        .table(Sales::Table)
                        .add_column(ColumnDef::new(Sales::CreatedByUserId).integer().null())
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Clients::Table)
                    .drop_column(Clients::LastContactedByUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Sales::Table)
                    .drop_column(Sales::CreatedByUserId)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Clients {
    Table,
    LastContactedByUserId,
}

#[derive(DeriveIden)]
enum Sales {
    Table,
    CreatedByUserId,
}
