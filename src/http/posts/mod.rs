mod likes;
mod listing;
mod posts;

pub(crate) use posts::router;
