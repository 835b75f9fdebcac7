mod gift_bomb;

pub use gift_bomb::{AggregatorTimer, BufferKey, GiftBombAggregator, GiftBombBuffer};
