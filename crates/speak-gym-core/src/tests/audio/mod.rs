mod capture;
mod playback;
mod wav;
