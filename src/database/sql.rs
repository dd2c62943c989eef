//! # SQL
//!
//! Catalog queries and statement builders.
//!
//! Role names are validated against `^[a-z_]+$` before they reach this
//! module. Identifiers are still emitted through [`quote_ident`] and the
//! password through [`quote_literal`], since PostgreSQL cannot bind
//! parameters in role DDL or GRANT/REVOKE.

/// Login roles among `$1`
pub const LOGIN_ROLES_QUERY: &str =
    "SELECT rolname::text FROM pg_roles WHERE rolcanlogin = true AND rolname = ANY($1::text[])";

/// Every name in `$1` paired with whether a role of that name exists
pub const ROLE_EXISTENCE_QUERY: &str = "
    WITH desired_roles AS (
        SELECT unnest($1::text[]) AS rolname
    )
    SELECT dr.rolname AS role,
        pr.rolname IS NOT NULL AS found
    FROM desired_roles dr
    LEFT JOIN pg_roles pr ON dr.rolname = pr.rolname";

/// Group roles the role named `$1` is a member of
pub const CURRENT_MEMBERSHIPS_QUERY: &str = "
    SELECT r.rolname::text AS role
    FROM pg_auth_members m
    JOIN pg_roles r ON m.roleid = r.oid
    JOIN pg_roles u ON m.member = u.oid
    WHERE u.rolname = $1";

/// Quote an identifier: wrap in double quotes, double any inner quote
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal: wrap in single quotes, double any inner quote
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn ident_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[must_use]
pub fn create_role(name: &str, password: &str) -> String {
    format!(
        "CREATE ROLE {} LOGIN PASSWORD {}",
        quote_ident(name),
        quote_literal(password)
    )
}

/// `IF EXISTS` keeps one manually removed role from blocking the rest of the batch
#[must_use]
pub fn drop_roles<S: AsRef<str>>(names: &[S]) -> String {
    format!("DROP ROLE IF EXISTS {}", ident_list(names))
}

#[must_use]
pub fn grant<S: AsRef<str>>(groups: &[S], role: &str) -> String {
    format!("GRANT {} TO {}", ident_list(groups), quote_ident(role))
}

#[must_use]
pub fn revoke<S: AsRef<str>>(groups: &[S], role: &str) -> String {
    format!("REVOKE {} FROM {}", ident_list(groups), quote_ident(role))
}
