use mdson::{analyze, decode, encode, transform_to_string, Context, Dialect, Id};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Recipe {
    id: Id,
    serves: u32,
    ingredients: Vec<String>,
}

fn main() {
    let mdson_data = "
.cook: Jane
# pancakes
.serves: 4
.Ingredients:
- flour
- eggs
- milk
Recipe by {cook}.
";

    let ctx = Context::default();
    let doc = match analyze(mdson_data, "example.mdson", &ctx) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Failed to parse MDSon: {:?}", miette::Report::new(e));
            return;
        }
    };
    print!("Parsed tree:\n{doc}");

    match decode::<Recipe>(&doc) {
        Ok(recipe) => {
            println!("\nDecoded: {recipe:?}");
            match encode(&recipe) {
                Ok(text) => println!("\nEncoded again:\n{text}"),
                Err(e) => eprintln!("Failed to encode: {e}"),
            }
        }
        Err(e) => eprintln!("Failed to decode: {e}"),
    }

    match transform_to_string(&doc, Dialect::Mom, &ctx) {
        Ok(groff) => println!("As groff/mom:\n{groff}"),
        Err(e) => eprintln!("Failed to transform: {e}"),
    }
}
