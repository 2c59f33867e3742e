//! Records exchanged with the laboratory REST API.

pub mod customer;
pub mod lenient;
pub mod order;
pub mod order_parameter;
pub mod parameter;
pub mod quotation;
pub mod sample;

pub type ParameterId = i64;
pub type CustomerId = i64;
pub type OrderId = i64;
pub type QuotationId = i64;
pub type OrderParameterId = i64;
pub type SampleId = i64;

pub use customer::{CustomerInput, CustomerRequest};
pub use order::{order_number, Attachment, LifecycleStage, Order, OrderForm};
pub use order_parameter::{NewOrderParameter, OrderParameter, ResultUpdate};
pub use parameter::{Parameter, ParameterInput};
pub use quotation::{NewQuotation, ParameterLine, Quotation};
pub use sample::{Sample, SampleCondition, SampleInput};
