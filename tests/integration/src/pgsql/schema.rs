#![cfg(test)]
use rowgate_pgsql::{ConnectorConfig, PgClient};
use shared::config::RowgateConfig;
use std::path::Path;

/// Load `config/default.toml` + `config/testing.toml` with `ROWGATE_*`
/// overrides, reading `env/.env` first when present.
pub fn load_test_config() -> RowgateConfig {
  dotenvy::from_path("../../env/.env").ok();
  shared::config::load_config(Path::new("../../config"), "testing")
    .expect("test configuration must load")
}

pub async fn connect(cfg: &RowgateConfig, role: &str) -> PgClient {
  PgClient::connect(ConnectorConfig::from_rowgate_config(cfg, role))
    .await
    .expect("failed to connect to the test database")
}

/// Create the registry and the `note` table used by the live tests.
/// Serialized with an advisory lock so parallel tests can share it.
pub async fn apply_fixtures(client: &tokio_postgres::Client) {
  client
    .batch_execute(
      r#"
      BEGIN;
      SELECT pg_advisory_xact_lock(727001);

      DO $$
      BEGIN
        IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'authenticated') THEN
          CREATE ROLE authenticated NOLOGIN;
        END IF;
        IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'anon') THEN
          CREATE ROLE anon NOLOGIN;
        END IF;
      END
      $$;
      GRANT authenticated TO CURRENT_USER;
      GRANT anon TO CURRENT_USER;

      CREATE SCHEMA IF NOT EXISTS realtime;
      DO $$
      BEGIN
        IF NOT EXISTS (
          SELECT 1 FROM pg_type t JOIN pg_namespace n ON n.oid = t.typnamespace
          WHERE n.nspname = 'realtime' AND t.typname = 'user_defined_filter'
        ) THEN
          CREATE TYPE realtime.user_defined_filter AS (column_name text, op text, value text);
        END IF;
      END
      $$;
      CREATE TABLE IF NOT EXISTS realtime.subscription (
        id bigint GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        subscription_id uuid NOT NULL,
        entity regclass NOT NULL,
        filters realtime.user_defined_filter[] NOT NULL DEFAULT '{}',
        claims jsonb NOT NULL,
        created_at timestamp NOT NULL DEFAULT now()
      );

      CREATE TABLE IF NOT EXISTS public.note (
        id bigserial PRIMARY KEY,
        user_id uuid NOT NULL,
        body text,
        dummy text
      );
      ALTER TABLE public.note ENABLE ROW LEVEL SECURITY;
      DROP POLICY IF EXISTS note_owner ON public.note;
      CREATE POLICY note_owner ON public.note FOR SELECT TO authenticated
        USING (user_id = (current_setting('request.jwt.claims', true)::jsonb ->> 'sub')::uuid);
      REVOKE ALL ON public.note FROM authenticated, anon;
      GRANT USAGE ON SCHEMA public TO authenticated, anon;
      GRANT SELECT (id, user_id, body) ON public.note TO authenticated;

      COMMIT;
      "#,
    )
    .await
    .expect("failed to apply fixtures");
}

pub async fn drop_slot(client: &tokio_postgres::Client, slot: &str) {
  let _ = client
    .execute(
      "SELECT pg_drop_replication_slot(slot_name) FROM pg_replication_slots WHERE slot_name = $1",
      &[&slot],
    )
    .await;
}
