use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Always stored lowercased.
    #[sea_orm(unique)]
    pub username: String,

    /// Always stored lowercased. Unique across active and inactive accounts.
    #[sea_orm(unique)]
    pub email: String,

    pub first_name: String,

    pub last_name: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// Cleared by account deletion; the row itself is never removed.
    pub is_active: bool,

    pub is_staff: bool,

    pub is_superuser: bool,

    pub date_joined: String,

    pub last_login: Option<String>,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
