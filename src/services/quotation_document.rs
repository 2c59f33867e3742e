//! Templating input for the quotation document.
//!
//! Rendering and styling belong to the document collaborator; this module
//! only prepares the numbers and blocks it fills in.

use crate::config::{AppConfig, SellerConfig};
use crate::models::{CustomerRequest, Quotation};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];
const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuyerBlock {
    pub company: String,
    pub contact: String,
    pub address: String,
    pub email: String,
    pub phone: String,
}

impl From<&CustomerRequest> for BuyerBlock {
    fn from(customer: &CustomerRequest) -> Self {
        Self {
            company: customer.c_name.clone(),
            contact: customer.name.clone(),
            address: customer.address.clone(),
            email: customer.email.clone(),
            phone: customer.phone_number.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SellerBlock {
    pub company_name: String,
    pub address: String,
    pub gstin: String,
    pub email: String,
    pub phone: String,
}

impl From<&SellerConfig> for SellerBlock {
    fn from(seller: &SellerConfig) -> Self {
        Self {
            company_name: seller.company_name.clone(),
            address: seller.address.clone(),
            gstin: seller.gstin.clone(),
            email: seller.email.clone(),
            phone: seller.phone.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentLine {
    pub index: usize,
    pub product: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub sgst_rate: Decimal,
    pub sgst_amount: Decimal,
    pub cgst_rate: Decimal,
    pub cgst_amount: Decimal,
    pub round_off: Decimal,
    pub total_amount: Decimal,
    pub amount_in_words: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuotationDocument {
    pub quotation_number: String,
    pub date: NaiveDate,
    pub seller: SellerBlock,
    pub buyer: BuyerBlock,
    pub lines: Vec<DocumentLine>,
    pub totals: DocumentTotals,
}

/// Taxes rounded to one decimal, total to the nearest rupee, both with
/// ties going to the even digit.
pub fn compute_totals(subtotal: Decimal, sgst_rate: Decimal, cgst_rate: Decimal) -> DocumentTotals {
    let hundred = Decimal::ONE_HUNDRED;
    let sgst_amount = (subtotal * sgst_rate / hundred)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven);
    let cgst_amount = (subtotal * cgst_rate / hundred)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven);
    let with_tax = subtotal + sgst_amount + cgst_amount;
    let total_amount = with_tax.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let round_off = (total_amount - with_tax).round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven);

    DocumentTotals {
        subtotal,
        sgst_rate,
        sgst_amount,
        cgst_rate,
        cgst_amount,
        round_off,
        total_amount,
        amount_in_words: amount_in_words(total_amount),
    }
}

fn below_hundred(n: u64) -> String {
    match n {
        0..=19 => ONES[n as usize].to_string(),
        _ => {
            let tens = TENS[(n / 10) as usize];
            match n % 10 {
                0 => tens.to_string(),
                ones => format!("{} {}", tens, ONES[ones as usize]),
            }
        }
    }
}

fn below_thousand(n: u64) -> String {
    let mut parts = Vec::new();
    if n >= 100 {
        parts.push(format!("{} Hundred", ONES[(n / 100) as usize]));
    }
    if n % 100 > 0 {
        parts.push(below_hundred(n % 100));
    }
    parts.join(" ")
}

/// Indian numbering: thousand, lakh, crore. Amounts of a hundred crore or
/// more repeat the scale ("One Hundred Crore").
pub fn number_to_words(n: u64) -> String {
    if n == 0 {
        return "Zero".to_string();
    }
    let crore = n / 10_000_000;
    let rest = n % 10_000_000;
    let lakh = rest / 100_000;
    let thousand = (rest % 100_000) / 1_000;
    let hundreds = rest % 1_000;

    let mut parts = Vec::new();
    if crore > 0 {
        parts.push(format!("{} Crore", number_to_words(crore)));
    }
    if lakh > 0 {
        parts.push(format!("{} Lakh", below_hundred(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", below_hundred(thousand)));
    }
    if hundreds > 0 {
        parts.push(below_thousand(hundreds));
    }
    parts.join(" ")
}

/// "Rupees One Lakh Twenty Thousand Only", with paise when present.
pub fn amount_in_words(amount: Decimal) -> String {
    let amount = amount.abs();
    let rupees = amount.trunc();
    let paise = ((amount - rupees) * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_u64()
        .unwrap_or(0);

    let mut words = format!("Rupees {}", number_to_words(rupees.to_u64().unwrap_or(0)));
    if paise > 0 {
        words.push_str(&format!(" and {} Paise", number_to_words(paise)));
    }
    words.push_str(" Only");
    words
}

pub fn build_document(
    config: &AppConfig,
    customer: &CustomerRequest,
    quotation: &Quotation,
    date: NaiveDate,
) -> QuotationDocument {
    let lines: Vec<DocumentLine> = quotation
        .parameter_info
        .iter()
        .enumerate()
        .map(|(i, line)| DocumentLine {
            index: i + 1,
            product: line.name.clone(),
            unit_price: line.cost,
            quantity: line.quantity,
            amount: line.line_total(),
        })
        .collect();
    let subtotal = lines.iter().map(|l| l.amount).sum();

    QuotationDocument {
        quotation_number: format!("{}/{:03}", config.seller.quotation_prefix, quotation.id),
        date,
        seller: SellerBlock::from(&config.seller),
        buyer: BuyerBlock::from(customer),
        lines,
        totals: compute_totals(subtotal, config.sgst_rate, config.cgst_rate),
    }
}
