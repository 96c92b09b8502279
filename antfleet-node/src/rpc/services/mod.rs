pub(crate) mod fleet_impl;
