pub mod session {

    /// Session key holding the authenticated user's id.
    pub const USER_ID_KEY: &str = "_auth_user_id";

    /// Session key holding the user's session hash at login time.
    pub const USER_HASH_KEY: &str = "_auth_user_hash";

    pub const MESSAGES_KEY: &str = "_messages";
}

pub mod templates {

    pub const REGISTER: &str = "registration/register.html";

    pub const LOGIN: &str = "registration/login.html";

    pub const LOGGED_OUT: &str = "registration/logged_out.html";

    pub const PASSWORD_CHANGE: &str = "registration/password_change_form.html";

    pub const DETAIL: &str = "users/detail.html";

    pub const UPDATE: &str = "users/update.html";
}

pub mod messages {

    pub const USER_DELETED: &str = "User has been deleted.";

    pub const PASSWORD_CHANGED: &str = "Password has been changed.";
}
