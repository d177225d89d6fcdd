// Module exports for pure logic
pub mod listing;   // Input coercion + cached summary record
pub mod recency;   // Promote/trim/remove over the entry list
