//! Construcción de la línea de comandos de ffmpeg.
//!
//! El encoder siempre emite MP3 CBR a 128 kbps por stdout, leyendo su
//! entrada a velocidad de reloj (`-re`): eso es lo que hace que la emisión
//! sea síncrona entre oyentes.

use crate::fetch::AudioInput;

/// Protocolos que se permiten cuando la entrada es un manifiesto HLS.
const HLS_PROTOCOL_WHITELIST: &str = "file,http,https,tcp,tls,crypto";

/// Argumentos de ffmpeg para una entrada dada. La salida es siempre la
/// misma: `-vn -acodec libmp3lame -b:a 128k -f mp3 pipe:1`.
pub fn encoder_args(input: &AudioInput) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
    ];

    match input {
        AudioInput::Stream(_) => {
            args.push("-re".into());
            args.push("-i".into());
            args.push("pipe:0".into());
        }
        AudioInput::Remote { url, headers, hls } => {
            if *hls {
                args.push("-protocol_whitelist".into());
                args.push(HLS_PROTOCOL_WHITELIST.into());
            }
            if !headers.is_empty() {
                let block: String = headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}\r\n", k, v))
                    .collect();
                args.push("-headers".into());
                args.push(block);
            }
            args.push("-re".into());
            args.push("-i".into());
            args.push(url.clone());
        }
    }

    args.extend(
        [
            "-vn", "-acodec", "libmp3lame", "-b:a", "128k", "-f", "mp3", "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_input_args() {
        let input = AudioInput::Stream(Box::new(std::io::Cursor::new(Vec::new())));
        let args = encoder_args(&input);
        let joined = args.join(" ");
        assert!(joined.contains("-re -i pipe:0"));
        assert!(joined.ends_with("-vn -acodec libmp3lame -b:a 128k -f mp3 pipe:1"));
        assert!(!joined.contains("-protocol_whitelist"));
    }

    #[test]
    fn test_remote_hls_input_args() {
        let input = AudioInput::Remote {
            url: "https://cdn.example/playlist.m3u8".into(),
            headers: vec![("Authorization".into(), "OAuth abc".into())],
            hls: true,
        };
        let args = encoder_args(&input);
        let joined = args.join(" ");
        assert!(joined.contains("-protocol_whitelist file,http,https,tcp,tls,crypto"));
        assert!(args.contains(&"Authorization: OAuth abc\r\n".to_string()));
        assert!(joined.contains("-re -i https://cdn.example/playlist.m3u8"));
    }

    #[test]
    fn test_remote_plain_input_has_no_whitelist() {
        let input = AudioInput::Remote {
            url: "https://cdn.example/audio.mp3".into(),
            headers: Vec::new(),
            hls: false,
        };
        let joined = encoder_args(&input).join(" ");
        assert!(!joined.contains("-protocol_whitelist"));
        assert!(!joined.contains("-headers"));
    }
}
