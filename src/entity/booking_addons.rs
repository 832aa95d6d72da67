use sea_orm::entity::prelude::*;

/// Immutable line-item snapshot; later addon price changes never alter it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "booking_addons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub booking_id: Uuid,
    pub addon_id: Uuid,
    pub qty: i32,
    pub price: i64,
    pub subtotal: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bookings::Entity",
        from = "Column::BookingId",
        to = "super::bookings::Column::Id"
    )]
    Bookings,
    #[sea_orm(
        belongs_to = "super::addons::Entity",
        from = "Column::AddonId",
        to = "super::addons::Column::Id"
    )]
    Addons,
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl Related<super::addons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addons.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
