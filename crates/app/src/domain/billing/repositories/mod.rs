//! Billing repositories

mod bill_items;
mod catalog;
mod schedules;

pub(crate) use bill_items::PgBillItemsRepository;
pub(crate) use catalog::PgCatalogRepository;
pub(crate) use schedules::PgSchedulesRepository;
