/// Route component constants shared across crates
pub const API_ROUTE_COMPONENT: &str = "api";
pub const API_ROUTE_PREFIX: &str = const_str::concat!("/", API_ROUTE_COMPONENT);

pub const V1_ROUTE_COMPONENT: &str = "v1";
pub const V1_ROUTE_PREFIX: &str = const_str::concat!(API_ROUTE_PREFIX, "/", V1_ROUTE_COMPONENT);

/// Routes under this prefix only require authentication, never a casbin grant.
pub const PUB_ROUTE_COMPONENT: &str = "pub";
pub const PUB_ROUTE_PREFIX: &str = const_str::concat!(V1_ROUTE_PREFIX, "/", PUB_ROUTE_COMPONENT);

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Environment variable prefix, e.g. `GATEHOUSE__AUTH__SIGNING_KEY`.
pub const ENV_PREFIX: &str = "GATEHOUSE";
