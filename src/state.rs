use crate::{
    auth::RollcallSession,
    config::RuntimeConfiguration,
    error::{GetDatabaseConnectionSnafu, MigrateSnafu, OpenDatabaseSnafu, RollcallResult},
    maud_conveniences::render_nav,
};
use maud::{DOCTYPE, Markup, html};
use snafu::ResultExt;
use sqlx::{Pool, Postgres, Transaction, pool::PoolConnection, postgres::PgPoolOptions};
use std::ops::Deref;

#[derive(Clone, Debug)]
pub struct RollcallState {
    pool: Pool<Postgres>,
    config: RuntimeConfiguration,
}

impl RollcallState {
    pub async fn new(options: PgPoolOptions, config: RuntimeConfiguration) -> RollcallResult<Self> {
        let pool = options
            .connect(config.db_config().get_db_path())
            .await
            .context(OpenDatabaseSnafu)?;

        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;

        Ok(Self::from_pool(pool, config))
    }

    /// Wraps an existing pool without running migrations.
    pub const fn from_pool(pool: Pool<Postgres>, config: RuntimeConfiguration) -> Self {
        Self { pool, config }
    }

    pub const fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    #[allow(clippy::unused_self, clippy::needless_pass_by_value)] //in case self is ever needed :), and to allow direct html! usage
    pub fn render(&self, auth_session: RollcallSession, markup: Markup) -> Markup {
        let nav = render_nav(auth_session.user.as_ref());

        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Rollcall" }
                }
                body class="bg-gray-900 min-h-screen flex flex-col items-center justify-center text-white" {
                    (nav)
                    (markup)
                }
            }
        }
    }

    pub async fn get_connection(&self) -> RollcallResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    pub async fn get_transaction(&self) -> RollcallResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.context(GetDatabaseConnectionSnafu)
    }
}

impl Deref for RollcallState {
    type Target = Pool<Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
