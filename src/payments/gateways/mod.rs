pub mod easypaisa;
pub mod jazzcash;
pub mod safepay;

pub use easypaisa::EasyPaisaGateway;
pub use jazzcash::JazzCashGateway;
pub use safepay::SafePayGateway;
