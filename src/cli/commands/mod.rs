mod users;

pub use users::{cmd_users_create, cmd_users_list, cmd_users_show};
