use crate::metrics::{latest_prices, market_summary};
use crate::price_table::PriceTable;
use crate::session::Session;
use comfy_table::{
    presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement, Table,
};
use piechart::{Chart, Color};

pub fn format_currency(value: f64, currency: &str) -> String {
    let formatted_number = format_with_commas(value);

    match currency {
        "USD" | "CAD" | "AUD" | "HKD" | "SGD" => format!("${formatted_number}"),
        "EUR" => format!("{formatted_number} €"),
        "GBP" => format!("£{formatted_number}"),
        "" => formatted_number,
        _ => format!("{formatted_number} {currency}"),
    }
}

pub fn format_with_commas(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let formatted_integer = integer_part
        .chars()
        .rev()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect::<String>();

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{sign}{formatted_integer}.{decimal_part}")
}

/// Signed price change, e.g. "+1.20" or "-0.40".
pub fn format_delta(delta: f64) -> String {
    let formatted = format!("{:.2}", delta.abs());
    if formatted == "0.00" {
        formatted
    } else if delta > 0.0 {
        format!("+{formatted}")
    } else {
        format!("-{formatted}")
    }
}

fn delta_color(delta: f64) -> TColor {
    if delta > 0.0 {
        TColor::Green
    } else if delta < 0.0 {
        TColor::Red
    } else {
        TColor::White
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

pub fn summary_table(table: &PriceTable, currency: &str) -> Table {
    let mut out = Table::new();
    out.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100)
        .set_header(header(&["Group", "Price", "Change", "%Change"]));

    for quote in market_summary(table) {
        let color = delta_color(quote.delta);
        let pct = quote
            .percent_change
            .map(|v| format!("{v:.2}%"))
            .unwrap_or_else(|| "-".to_string());
        out.add_row(vec![
            Cell::new(&quote.group),
            Cell::new(format_currency(quote.price, currency)).set_alignment(CellAlignment::Right),
            Cell::new(format_delta(quote.delta))
                .set_alignment(CellAlignment::Right)
                .fg(color),
            Cell::new(pct).set_alignment(CellAlignment::Right).fg(color),
        ]);
    }
    out
}

pub fn holdings_table(session: &Session, currency: &str) -> Table {
    let mut out = Table::new();
    out.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100)
        .set_header(header(&["Group", "Shares", "Price", "Value"]));

    for (group, quantity) in session.non_zero_holdings() {
        let price = session.table().latest_price(group).unwrap_or(0.0);
        out.add_row(vec![
            Cell::new(group),
            Cell::new(quantity).set_alignment(CellAlignment::Right),
            Cell::new(format_currency(price, currency)).set_alignment(CellAlignment::Right),
            Cell::new(format_currency(quantity as f64 * price, currency))
                .set_alignment(CellAlignment::Right),
        ]);
    }

    out.add_row(vec![
        Cell::new("Cash").fg(TColor::DarkGreen),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_currency(session.balance(), currency)).set_alignment(CellAlignment::Right),
    ]);
    out.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_currency(session.net_worth(), currency))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
    ]);
    out
}

pub fn print_summary(table: &PriceTable, currency: &str) {
    if let Some((top, price)) = latest_prices(table).first() {
        println!(
            "Latest period: {} | top group: {top} at {}",
            table.periods()[table.period_count() - 1],
            format_currency(*price, currency)
        );
    }
    println!("{}", summary_table(table, currency));
}

pub fn print_holdings(session: &Session, currency: &str) {
    println!("{}", holdings_table(session, currency));
}

/// Pie chart of net worth split into cash and per-group holdings value.
pub fn draw_allocation(session: &Session) {
    let colors = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Cyan,
        Color::White,
        Color::Purple,
    ];

    let mut data = vec![piechart::Data {
        label: "Cash".to_string(),
        value: session.balance() as f32,
        color: Some(Color::Black.into()),
        fill: '•',
    }];

    for (i, (group, quantity)) in session.non_zero_holdings().into_iter().enumerate() {
        let price = session.table().latest_price(group).unwrap_or(0.0);
        data.push(piechart::Data {
            label: group.to_string(),
            value: (quantity as f64 * price) as f32,
            color: Some(colors[i % colors.len()].into()),
            fill: '•',
        });
    }

    Chart::new()
        .legend(true)
        .radius(9)
        .aspect_ratio(3)
        .draw(&data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::STARTING_BALANCE;

    #[test]
    fn test_format_with_commas() {
        assert_eq!(format_with_commas(0.0), "0.00");
        assert_eq!(format_with_commas(940.0), "940.00");
        assert_eq!(format_with_commas(1234567.891), "1,234,567.89");
        assert_eq!(format_with_commas(-123456.0), "-123,456.00");
        assert_eq!(format_with_commas(-0.001), "0.00");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1000.0, "SAR"), "1,000.00 SAR");
        assert_eq!(format_currency(12.5, "USD"), "$12.50");
        assert_eq!(format_currency(12.5, "EUR"), "12.50 €");
        assert_eq!(format_currency(12.5, ""), "12.50");
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(1.2), "+1.20");
        assert_eq!(format_delta(-0.4), "-0.40");
        assert_eq!(format_delta(0.0), "0.00");
        assert_eq!(format_delta(-0.001), "0.00");
        assert_eq!(format_delta(0.004), "0.00");
        assert_eq!(format_delta(-0.005001), "-0.01");
    }

    #[test]
    fn test_summary_table() {
        let table = PriceTable::from_file("market_data.csv").unwrap();
        let rendered = summary_table(&table, "SAR").to_string();
        let ravens = rendered.find("Ravens").unwrap();
        let hawks = rendered.find("Hawks").unwrap();
        assert!(ravens < hawks);
        assert!(rendered.contains("16.70 SAR"));
    }

    #[test]
    fn test_holdings_table() {
        let mut session = Session::open("market_data.csv", STARTING_BALANCE).unwrap();
        session.execute_purchase("Falcons", 10).unwrap();
        let rendered = holdings_table(&session, "USD").to_string();
        assert!(rendered.contains("Falcons"));
        assert!(rendered.contains("$146.00"));
        assert!(rendered.contains("$854.00"));
        assert!(rendered.contains("$1,000.00"));
        assert!(!rendered.contains("Eagles"));
    }
}
