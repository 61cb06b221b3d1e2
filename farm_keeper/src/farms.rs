//! Placeholder profiles for players first seen on the ledger.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::orm::players::PlayerInsertDb;
use shared::player::PlayerAddress;

const STOCK_FARM_IMAGES: u32 = 12;

const FARM_WORDS: &[&str] = &[
    "Acorn", "Barley", "Brook", "Cedar", "Clover", "Copper", "Cricket", "Golden", "Harvest",
    "Hickory", "Honey", "Maple", "Meadow", "Millstone", "Orchard", "Prairie", "Rusty", "Sunny",
    "Thistle", "Willow",
];

const CORNY_QUOTES: &[(&str, &str)] = &[
    ("Dwight D. Eisenhower", "Farming looks mighty easy when your plow is a pencil and you're a thousand miles from the corn field."),
    ("Torquato Tasso", "The day of fortune is like a harvest day, We must be busy when the corn is ripe."),
    ("Anne Bronte", "A light wind swept over the corn, and all nature laughed in the sunshine."),
    ("William Bernbach", "Today's smartest advertising style is tomorrow's corn."),
    ("Michael Pollan", "Corn is a greedy crop, as farmers will tell you."),
    ("Masanobu Fukuoka", "The ultimate goal of farming is not the growing of crops, but the cultivation and perfection of human beings."),
    ("Cato the Elder", "It is thus with farming: if you do one thing late, you will be late in all your work."),
    ("Arthur Keith", "The discovery of agriculture was the first big step toward a civilized life."),
    ("Samuel Johnson", "Agriculture not only gives riches to a nation, but the only riches she can call her own."),
    ("Sam Farr", "To make agriculture sustainable, the grower has got to be able to make a profit."),
    ("Thomas Jefferson", "Agriculture is our wisest pursuit, because it will in the end contribute most to real wealth, good morals, and happiness."),
    ("George Washington", "Agriculture is the most healthful, most useful, and most noble employment of man."),
    ("Brian Brett", "Farming is a profession of hope."),
    ("Douglas Jerrold", "If you tickle the earth with a hoe she laughs with a harvest."),
    ("unknown", "You can make a small fortune in farming-provided you start with a large one."),
];

/// A new player row for `address` with a random name, proverb and stock image.
pub fn placeholder_player(address: &PlayerAddress, image_base_url: &str) -> PlayerInsertDb {
    let mut rng = rand::thread_rng();

    let word = FARM_WORDS.choose(&mut rng).copied().unwrap_or("Corn");
    let description = CORNY_QUOTES
        .choose(&mut rng)
        .map(|(author, quote)| format!("\"{quote}\" \u{2013} {author}"))
        .unwrap_or_default();
    let image = rng.gen_range(1..=STOCK_FARM_IMAGES);

    PlayerInsertDb {
        address: address.0.clone(),
        name: format!("{word} Farm"),
        description,
        image_url: format!("{}/{image}.jpg", image_base_url.trim_end_matches('/')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_uses_stock_images_and_keeps_address() {
        let address = PlayerAddress("1BitcornFarmer".to_owned());
        for _ in 0..50 {
            let player = placeholder_player(&address, "https://farms.test/img/farms/");
            assert_eq!(player.address, "1BitcornFarmer");
            assert!(player.name.ends_with(" Farm"));
            assert!(player.description.starts_with('"'));

            let image = player
                .image_url
                .strip_prefix("https://farms.test/img/farms/")
                .and_then(|file| file.strip_suffix(".jpg"))
                .and_then(|number| number.parse::<u32>().ok())
                .expect("stock image url");
            assert!((1..=STOCK_FARM_IMAGES).contains(&image));
        }
    }
}
