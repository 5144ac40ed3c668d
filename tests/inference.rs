mod common;

use common::source;
use proptest::prelude::*;
use sheetbridge::{LogicalType, inference};

fn single_column(values: &[String]) -> LogicalType {
    let rows = values.iter().map(|v| vec![v.as_str()]).collect::<Vec<_>>();
    inference::infer(&["value".to_string()], &rows).columns()[0].logical_type
}

proptest! {
    #[test]
    fn integer_columns_infer_integer(
        values in proptest::collection::vec(any::<i64>(), 1..40),
        blanks in proptest::collection::vec(any::<bool>(), 40),
    ) {
        let mut cells = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        for (cell, blank) in cells.iter_mut().zip(blanks) {
            if blank {
                cell.clear();
            }
        }
        cells.push(values[0].to_string());
        prop_assert_eq!(single_column(&cells), LogicalType::Integer);
    }

    #[test]
    fn one_unparseable_cell_forces_text(
        values in proptest::collection::vec(any::<i64>(), 0..20),
        position in any::<prop::sample::Index>(),
    ) {
        let mut cells = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let at = position.index(cells.len() + 1);
        cells.insert(at, "n/a".to_string());
        prop_assert_eq!(single_column(&cells), LogicalType::Text);
    }
}

proptest! {
    #[test]
    fn zero_one_columns_infer_integer(bits in proptest::collection::vec(0u8..=1, 1..40)) {
        let cells = bits.iter().map(|b| b.to_string()).collect::<Vec<_>>();
        prop_assert_eq!(single_column(&cells), LogicalType::Integer);
    }
}

#[test]
fn integers_with_one_decimal_infer_real() {
    let cells = ["1", "2", "3.5"].map(String::from);
    assert_eq!(single_column(&cells), LogicalType::Real);
}

#[test]
fn sampling_stops_at_requested_row_count() {
    let mut rows = source("code\n1\n2\nabc\n");
    let (schema, sampled) = inference::infer_from_source(&mut rows, 2).unwrap();
    assert_eq!(sampled.len(), 2);
    assert_eq!(schema.columns()[0].logical_type, LogicalType::Integer);
    let rest = rows.next_row().unwrap().expect("third row still unread");
    assert_eq!(rest.cells, ["abc"]);
}

#[test]
fn mixed_file_infers_each_column_independently() {
    let csv = "id,active,price,joined,seen_at,note\n\
               1,yes,9.99,2024-01-05,2024-01-05 10:00:00,hello\n\
               2,no,10,01/06/2024,2024-01-06T11:15:30Z,\n\
               3,,12.5,,,\"quoted, text\"\n";
    let mut rows = source(csv);
    let (schema, _) = inference::infer_from_source(&mut rows, 50).unwrap();
    let types = schema
        .columns()
        .iter()
        .map(|c| c.logical_type)
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        [
            LogicalType::Integer,
            LogicalType::Boolean,
            LogicalType::Real,
            LogicalType::Date,
            LogicalType::Timestamp,
            LogicalType::Text,
        ]
    );
}
