pub mod pagination {

    pub const DEFAULT_PAGE_SIZE: u64 = 50;

    pub const MIN_PAGE_SIZE: u64 = 10;

    pub const MAX_PAGE_SIZE: u64 = 200;

    /// Keeps `page * page_size` well inside the range SQLite accepts as an offset.
    pub const MAX_PAGE: u64 = 1_000_000;
}

pub mod phantom {

    pub const ALL_OLTS: &str = "*";

    pub const SUBSCRIBER_ROW_MIN_FIELDS: usize = 6;
}

pub mod uploads {

    /// Headroom on top of the receipt limit for the other multipart fields.
    pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
}
