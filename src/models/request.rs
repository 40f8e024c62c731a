use sea_orm::entity::prelude::*;

/// One cached catalog response. `request_url` holds the request key.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "request")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub request_id: i32,
    #[sea_orm(unique)]
    pub request_url: String,
    pub response: String,
    pub timestamp: String, // RFC 3339
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
