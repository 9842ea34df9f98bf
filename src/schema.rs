use sea_query::Iden;

/// Toilets table - provisioned locations
#[derive(Iden, Clone, Copy)]
pub enum Toilets {
    Table,
    Id,
    Name,
    Location,
    Building,
    Floor,
    CreatedAt,
}

/// Feedbacks table - one row per form submission
#[derive(Iden, Clone, Copy)]
pub enum Feedbacks {
    Table,
    Id,
    ToiletId,
    CleanlinessRating,
    WaterAvailable,
    SoapAvailable,
    Comments,
    Name,
    Mobile,
    ExtraFeedback,
    Photos,
    Videos,
    IpAddress,
    UserAgent,
    CreatedAt,
}
