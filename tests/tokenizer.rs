use csv_to_shp::tokenizer::{Malformed, TokenHandler, Tokenizer};

#[derive(Default)]
struct Rows {
    rows: Vec<Vec<String>>,
    current: Vec<String>,
}

impl TokenHandler for Rows {
    type Error = Malformed;

    fn on_field(&mut self, bytes: &[u8], _field: usize, _record: u64) -> Result<(), Malformed> {
        self.current.push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn on_record_end(&mut self, _record: u64) -> Result<(), Malformed> {
        self.rows.push(std::mem::take(&mut self.current));
        Ok(())
    }
}

fn tokenize(input: &str, chunk_size: usize) -> Vec<Vec<String>> {
    let mut tokenizer = Tokenizer::new();
    let mut rows = Rows::default();
    for chunk in input.as_bytes().chunks(chunk_size) {
        tokenizer.feed(chunk, &mut rows).unwrap();
    }
    tokenizer.finish(&mut rows).unwrap();
    rows.rows
}

fn with_csv_crate(input: &str) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes())
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn agrees_with_csv_crate_on_well_formed_input() {
    let input = concat!(
        "station,lon,lat,comment\r\n",
        "A1,4.35,50.85,\"windy, cold\"\r\n",
        "B2,-0.12,51.5,\"said \"\"hello\"\"\"\r\n",
        "C3,2.35,48.85,\"two\nlines\"\r\n",
        "D4,13.4,52.52,\r\n",
        "E5,0,0,last",
    );

    let expected = with_csv_crate(input);
    assert_eq!(expected.len(), 6);
    for chunk_size in [1, 2, 5, 64, input.len()] {
        assert_eq!(tokenize(input, chunk_size), expected, "chunk size {chunk_size}");
    }
}
