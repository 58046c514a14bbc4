//! Pipeline del encoder.
//!
//! Envuelve un subproceso ffmpeg de larga vida que convierte el
//! `AudioInput` en un stream de frames MP3. El ciclo de vida se comunica
//! como mensajes por canal hacia el bucle serial del motor, etiquetados
//! con la generación del pipeline para descartar eventos rezagados de un
//! encoder ya muerto.

pub mod depends;

use crate::engine::{EngineEvent, EngineEventKind};
use crate::error::{EmisoraError, Result};
use crate::fetch::{AudioInput, FetchedAudio};
use bytes::Bytes;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Tamaño de lectura sobre el stdout del encoder.
const READ_CHUNK: usize = 8 * 1024;

/// Un encoder vivo: subproceso + tareas de plomería.
pub struct EncoderPipeline {
    pid: Option<u32>,
    child: Child,
    fetcher: Option<Child>,
    feeder: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
}

impl EncoderPipeline {
    /// Lanza ffmpeg sobre la entrada y arranca las tareas lectora (stdout →
    /// eventos `Data`/`End`/`Error`) y alimentadora (stream → stdin) según
    /// la forma del `AudioInput`.
    pub fn spawn(
        fetched: FetchedAudio,
        generation: u64,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Self> {
        let FetchedAudio { input, fetcher } = fetched;
        let args = depends::ffmpeg::encoder_args(&input);

        let mut cmd = Command::new("ffmpeg");
        cmd.args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let piped_input = matches!(input, AudioInput::Stream(_));
        if piped_input {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| EmisoraError::Internal(format!("no se pudo lanzar ffmpeg: {}", e)))?;
        let pid = child.id();
        log::info!("🎛️ Encoder lanzado (pid={:?}, gen={})", pid, generation);

        // Alimentador: copia el stream crudo al stdin del encoder
        let feeder = if let AudioInput::Stream(mut raw) = input {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| EmisoraError::Internal("ffmpeg sin stdin".into()))?;
            Some(tokio::spawn(async move {
                if let Err(err) = tokio::io::copy(&mut raw, &mut stdin).await {
                    // El encoder cerró su pipe (kill o fin de track): no es fatal
                    log::debug!("Alimentador del encoder terminó: {}", err);
                }
            }))
        } else {
            None
        };

        // Lector: stdout del encoder → eventos hacia el motor
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EmisoraError::Internal("ffmpeg sin stdout".into()))?;
        let reader = tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => {
                        let _ = events.send(EngineEvent {
                            generation,
                            kind: EngineEventKind::EncoderEnd,
                        });
                        break;
                    }
                    Ok(n) => {
                        let chunk = Bytes::copy_from_slice(&buf[..n]);
                        if events
                            .send(EngineEvent {
                                generation,
                                kind: EngineEventKind::EncoderData(chunk),
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = events.send(EngineEvent {
                            generation,
                            kind: EngineEventKind::EncoderError(err.to_string()),
                        });
                        break;
                    }
                }
            }
        });

        Ok(Self {
            pid,
            child,
            fetcher,
            feeder,
            reader,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Congela el subproceso sin cerrar sus pipes.
    pub fn suspend(&self) -> Result<()> {
        self.signal(Signal::Stop)
    }

    /// Reanuda un subproceso congelado.
    pub fn resume(&self) -> Result<()> {
        self.signal(Signal::Continue)
    }

    #[cfg(unix)]
    fn signal(&self, signal: Signal) -> Result<()> {
        let pid = self
            .pid
            .ok_or_else(|| EmisoraError::Internal("encoder sin pid".into()))?;
        let signo = match signal {
            Signal::Stop => libc::SIGSTOP,
            Signal::Continue => libc::SIGCONT,
        };
        // SAFETY: kill(2) sobre el pid del hijo que este handle posee
        let rc = unsafe { libc::kill(pid as i32, signo) };
        if rc == 0 {
            Ok(())
        } else {
            Err(EmisoraError::Io(std::io::Error::last_os_error()))
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, _signal: Signal) -> Result<()> {
        // Sin señales stop/cont la pausa se emula sólo con silencio en el bus
        Err(EmisoraError::Internal(
            "señales de suspensión no disponibles en esta plataforma".into(),
        ))
    }

    /// Mata el subproceso y desmonta la plomería: aborta las tareas, manda
    /// SIGKILL al encoder (y al fetcher subproceso si lo hay) y deja una
    /// tarea recogiendo los procesos para que no queden zombis.
    pub fn destroy(mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        self.reader.abort();
        let _ = self.child.start_kill();
        if let Some(mut fetcher) = self.fetcher.take() {
            let _ = fetcher.start_kill();
            tokio::spawn(async move {
                let _ = fetcher.wait().await;
            });
        }
        let mut child = self.child;
        tokio::spawn(async move {
            let _ = child.wait().await;
        });
    }
}

enum Signal {
    Stop,
    Continue,
}
