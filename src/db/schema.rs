use crate::entities::{bookmark, category, comment, like, post, post_tag, tag, user};
use sea_orm::sea_query::{Index, TableCreateStatement};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};

fn table_for<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    stmt
}

/// Same as [`table_for`] with an inline composite unique key, so the key is
/// created together with the table and re-running bootstrap stays a no-op.
fn table_with_unique_pair<E, C>(
    schema: &Schema,
    entity: E,
    name: &str,
    first: C,
    second: C,
) -> TableCreateStatement
where
    E: EntityTrait,
    C: ColumnTrait,
{
    let mut stmt = table_for(schema, entity);
    stmt.index(Index::create().name(name).col(first).col(second).unique());
    stmt
}

/// Creates every table in foreign-key order.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        table_for(&schema, user::Entity),
        table_for(&schema, category::Entity),
        table_for(&schema, tag::Entity),
        table_for(&schema, post::Entity),
        table_with_unique_pair(
            &schema,
            post_tag::Entity,
            "unique_post_tag",
            post_tag::Column::PostId,
            post_tag::Column::TagId,
        ),
        table_for(&schema, comment::Entity),
        table_with_unique_pair(
            &schema,
            like::Entity,
            "unique_user_post_like",
            like::Column::UserId,
            like::Column::PostId,
        ),
        table_with_unique_pair(
            &schema,
            bookmark::Entity,
            "unique_user_post_bookmark",
            bookmark::Column::UserId,
            bookmark::Column::PostId,
        ),
    ];

    for table in tables.iter() {
        db.execute(backend.build(table)).await?;
    }

    Ok(())
}
