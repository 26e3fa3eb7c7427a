//! Discount Repositories

mod discounts;
mod tags;
mod trackers;

pub(crate) use discounts::PgDiscountsRepository;
pub(crate) use tags::PgTagsRepository;
pub(crate) use trackers::PgTrackersRepository;
