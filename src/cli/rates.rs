use super::ui;
use crate::core::RateResolver;
use crate::core::rates::{DATE_FORMAT, PairQuote, RateSnapshot};
use crate::core::validator::{Validator, check_date, check_pair};
use anyhow::{Result, bail};
use comfy_table::{Cell, Table};

/// Resolves and prints the snapshot for `raw_date`, today when `None`.
pub async fn run_rates(resolver: &RateResolver, raw_date: Option<&str>) -> Result<()> {
    let mut v = Validator::new();
    let date = check_date(&mut v, raw_date.unwrap_or_default());
    ensure_valid(&v)?;

    let pb = ui::new_spinner("Resolving rates");
    let result = resolver.resolve(date).await;
    pb.finish_and_clear();

    let snapshot = result?;
    println!(
        "\nRates on {} (base {})",
        ui::style_text(&snapshot.date.format(DATE_FORMAT).to_string(), ui::StyleType::Title),
        snapshot.base
    );
    println!("{}", rates_table(&snapshot));
    Ok(())
}

/// Resolves and prints today's cross rate for `raw_pair`.
pub async fn run_pair(resolver: &RateResolver, raw_pair: &str) -> Result<()> {
    let mut v = Validator::new();
    let pair = check_pair(&mut v, raw_pair, resolver.currencies());
    ensure_valid(&v)?;
    let Some(pair) = pair else {
        bail!("Invalid pair: {raw_pair}");
    };

    let pb = ui::new_spinner("Resolving pair");
    let result = resolver.resolve_pair(&pair).await;
    pb.finish_and_clear();

    println!("{}", pair_table(&result?));
    Ok(())
}

fn ensure_valid(v: &Validator) -> Result<()> {
    if v.valid() {
        return Ok(());
    }
    for (field, message) in v.errors() {
        eprintln!(
            "{} {}",
            ui::style_text(&format!("{field}:"), ui::StyleType::Error),
            message
        );
    }
    bail!("Invalid input");
}

fn rates_table(snapshot: &RateSnapshot) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Rate")]);
    for (currency, rate) in &snapshot.rates {
        table.add_row(vec![Cell::new(currency), ui::rate_cell(*rate)]);
    }
    table
}

fn pair_table(quote: &PairQuote) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
    ]);
    table.add_row(vec![
        Cell::new(&quote.date),
        Cell::new(&quote.pair),
        ui::rate_cell(quote.rate),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    #[test]
    fn test_rates_table_lists_currencies_in_order() {
        let snapshot = RateSnapshot::new(
            NaiveDate::from_ymd_opt(2024, 4, 20).unwrap(),
            "USD",
            BTreeMap::from([("UAH".to_string(), 39.4), ("EUR".to_string(), 0.9)]),
        );
        let rendered = rates_table(&snapshot).to_string();

        let eur = rendered.find("EUR").unwrap();
        let uah = rendered.find("UAH").unwrap();
        assert!(eur < uah);
        assert!(rendered.contains("39.400000"));
    }

    #[test]
    fn test_pair_table() {
        let quote = PairQuote {
            date: "2024-04-20".to_string(),
            pair: "USD-UAH".to_string(),
            rate: 39.4,
        };
        let rendered = pair_table(&quote).to_string();
        assert!(rendered.contains("USD-UAH"));
        assert!(rendered.contains("2024-04-20"));
    }

    #[test]
    fn test_invalid_input_is_reported() {
        let mut v = Validator::new();
        check_date(&mut v, "2021-01-");
        assert!(ensure_valid(&v).is_err());
        assert!(ensure_valid(&Validator::new()).is_ok());
    }
}
