//! Tile URL templates.
//!
//! Supported tokens: `{x}`, `{y}`, `{zoom}` (alias `{z}`), `{quadkey}` and
//! `{s}`. `{s}` picks one of the configured servers from the tile position,
//! so a tile always maps to the same URL.

use crate::layer::SettingsError;
use crate::tile::TileAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    servers: Vec<String>,
}

impl UrlTemplate {
    /// Validates `template` for the layer called `name`.
    pub fn parse(
        name: &str,
        template: &str,
        servers: Vec<String>,
    ) -> Result<Self, SettingsError> {
        let has = |token: &str| template.contains(token);
        let tiled = has("{x}") && has("{y}") && (has("{zoom}") || has("{z}"));
        if !tiled && !has("{quadkey}") {
            return Err(SettingsError::MissingPlaceholder {
                name: name.to_string(),
                url: template.to_string(),
            });
        }
        if has("{s}") && servers.is_empty() {
            return Err(SettingsError::MissingServers {
                name: name.to_string(),
            });
        }
        Ok(Self {
            template: template.to_string(),
            servers,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn expand(&self, tile: TileAddress) -> String {
        let mut url = self
            .template
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{zoom}", &tile.zoom.to_string())
            .replace("{z}", &tile.zoom.to_string());
        if url.contains("{quadkey}") {
            url = url.replace("{quadkey}", &tile.quadkey());
        }
        if !self.servers.is_empty() {
            let index = (tile.x as usize + tile.y as usize) % self.servers.len();
            url = url.replace("{s}", &self.servers[index]);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_xyz() {
        let template =
            UrlTemplate::parse("osm", "https://tile.example.com/{zoom}/{x}/{y}.png", vec![])
                .unwrap();
        assert_eq!(
            template.expand(TileAddress::new(3, 5, 7)),
            "https://tile.example.com/7/3/5.png"
        );
    }

    #[test]
    fn test_expand_quadkey() {
        let template = UrlTemplate::parse("bing", "https://t/{quadkey}.jpeg", vec![]).unwrap();
        assert_eq!(template.expand(TileAddress::new(3, 5, 3)), "https://t/213.jpeg");
    }

    #[test]
    fn test_server_rotation_is_stable() {
        let servers = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let template = UrlTemplate::parse("osm", "https://{s}.t/{z}/{x}/{y}", servers).unwrap();
        assert_eq!(template.expand(TileAddress::new(0, 0, 1)), "https://a.t/1/0/0");
        assert_eq!(template.expand(TileAddress::new(1, 0, 1)), "https://b.t/1/1/0");
        assert_eq!(template.expand(TileAddress::new(1, 1, 1)), "https://c.t/1/1/1");
        assert_eq!(
            template.expand(TileAddress::new(1, 1, 1)),
            template.expand(TileAddress::new(1, 1, 1))
        );
    }

    #[test]
    fn test_missing_placeholders_rejected() {
        assert!(matches!(
            UrlTemplate::parse("bad", "https://t/{x}/{y}.png", vec![]),
            Err(SettingsError::MissingPlaceholder { .. })
        ));
        assert!(matches!(
            UrlTemplate::parse("bad", "https://{s}.t/{quadkey}", vec![]),
            Err(SettingsError::MissingServers { .. })
        ));
    }
}
