use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "packages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub duration_minutes: i32,
    pub max_booking_per_slot: i32,
    pub max_person: i32,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::studios::Entity",
        from = "Column::StudioId",
        to = "super::studios::Column::Id"
    )]
    Studios,
    #[sea_orm(has_many = "super::addons::Entity")]
    Addons,
    #[sea_orm(has_many = "super::bookings::Entity")]
    Bookings,
}

impl Related<super::studios::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Studios.def()
    }
}

impl Related<super::addons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addons.def()
    }
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
